//! Wire protocol: request envelope and little-endian payload codecs.
//!
//! A message travels as `0x02 <base64(group, action, payload)> 0x03` over
//! the byte stream; replies are framed identically but carry the payload
//! alone. Payloads use little-endian fixed-width encodings: counts and
//! indices as `u16`, flags as `u8`, scalars as IEEE-754 words of the
//! engine's floating type.

use std::io::{self, Cursor};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use physics::{Scalar, Sphere, Vec3};

/// Starts an encoded message on the stream.
pub const START_BYTE: u8 = 0x02;
/// Ends an encoded message on the stream.
pub const END_BYTE: u8 = 0x03;

/// Action group codes.
pub mod group {
    pub const BASIC: u8 = 1;
    pub const SPHERES_UPDATING: u8 = 2;
    pub const CALCULATION: u8 = 3;
    pub const INFORMATION: u8 = 4;
    pub const SIMULATED_SYSTEM: u8 = 5;
    /// Unsolicited server-to-client frame stream.
    pub const FRAME: u8 = 6;
}

/// `basic` group actions.
pub mod basic {
    pub const GET_VERSION: u8 = 1;
    pub const GET_TRUE_STRING: u8 = 2;
    pub const GET_FLOATING_TYPE: u8 = 3;
    pub const TERMINATE_SERVER: u8 = 4;
}

/// `spheresUpdating` group actions.
pub mod spheres_updating {
    pub const ADD_ONE: u8 = 1;
    pub const REMOVE_LAST: u8 = 2;
    pub const UPDATE_ONE: u8 = 3;
    pub const GET_ONE: u8 = 4;
    pub const GET_ONE_FULL: u8 = 5;
    pub const GET_COUNT: u8 = 6;
    pub const ADD_SOME: u8 = 7;
    pub const REMOVE_SOME: u8 = 8;
    pub const UPDATE_ALL: u8 = 9;
    pub const UPDATE_POSITIONS_IN_BOX: u8 = 10;
}

/// `calculation` group actions.
pub mod calculation {
    pub const DO_ONE_STEP: u8 = 1;
    pub const DO_SOME_STEPS: u8 = 2;
    pub const START_SIMULATION: u8 = 3;
    pub const STOP_SIMULATION: u8 = 4;
    pub const GET_IS_SIMULATING: u8 = 5;
    pub const SET_TIME_STEP: u8 = 6;
    pub const GET_TIME_STEP: u8 = 7;
    pub const SET_INTEGRATOR_METHOD: u8 = 8;
    pub const GET_INTEGRATOR_METHOD: u8 = 9;
    pub const POP_STEP_COUNTER: u8 = 10;
    pub const POP_CALCULATION_COUNTER: u8 = 11;
    pub const UPDATE_COLLISION_DETECTION: u8 = 12;
    pub const UPDATE_GRAVITY_CALCULATION: u8 = 13;
    pub const UPDATE_LENNARD_JONES_CALCULATION: u8 = 14;
    pub const UPDATE_MAXIMUM_STEP_DIVISION: u8 = 15;
    pub const UPDATE_MAXIMUM_STEP_ERROR: u8 = 16;
    pub const UPDATE_FRAME_SENDING: u8 = 17;
    pub const GET_LAST_STEP_CALCULATION_TIME: u8 = 18;
}

/// `information` group actions.
pub mod information {
    pub const GET_TOTAL_ENERGY: u8 = 1;
    pub const GET_KINETIC_ENERGY: u8 = 2;
}

/// `simulatedSystem` group actions.
pub mod simulated_system {
    pub const UPDATE_SPHERE_E: u8 = 1;
    pub const UPDATE_SPHERE_POISSON_RATIO: u8 = 2;
    pub const UPDATE_WALL_E: u8 = 3;
    pub const UPDATE_WALL_POISSON_RATIO: u8 = 4;
    pub const UPDATE_EARTH_GRAVITY: u8 = 5;
    pub const UPDATE_GRAVITATIONAL_CONSTANT: u8 = 6;
    pub const UPDATE_BOX_SIZE: u8 = 7;
    pub const UPDATE_KINETIC_ENERGY: u8 = 8;
    pub const UPDATE_TARGET_TEMPERATURE: u8 = 9;
    pub const UPDATE_PERIODIC_BOUNDARY_CONDITIONS: u8 = 10;
    pub const UPDATE_LENNARD_JONES_EPSILON: u8 = 11;
    pub const UPDATE_LENNARD_JONES_SIGMA: u8 = 12;
}

/// Encodes a request or unsolicited message.
#[must_use]
pub fn encode_message(group: u8, action: u8, payload: &[u8]) -> Vec<u8> {
    let mut plain = Vec::with_capacity(payload.len() + 2);
    plain.push(group);
    plain.push(action);
    plain.extend_from_slice(payload);
    envelope(&plain)
}

/// Encodes a reply, which carries the payload alone.
#[must_use]
pub fn encode_reply(payload: &[u8]) -> Vec<u8> {
    envelope(payload)
}

fn envelope(plain: &[u8]) -> Vec<u8> {
    let encoded = BASE64.encode(plain);
    let mut out = Vec::with_capacity(encoded.len() + 2);
    out.push(START_BYTE);
    out.extend_from_slice(encoded.as_bytes());
    out.push(END_BYTE);
    out
}

/// Incremental scanner for envelopes split across reads.
///
/// Bytes outside a `0x02 .. 0x03` pair are discarded; an undecodable
/// base64 body yields an empty message, which the handler acknowledges
/// with an empty reply per the protocol-error contract.
#[derive(Default)]
pub struct MessageDecoder {
    buffer: Vec<u8>,
}

impl MessageDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extracts and decodes the next complete message, if any.
    pub fn next_message(&mut self) -> Option<Vec<u8>> {
        let start = self.buffer.iter().position(|&b| b == START_BYTE)?;
        let end = start
            + 1
            + self.buffer[start + 1..]
                .iter()
                .position(|&b| b == END_BYTE)?;
        let decoded = BASE64
            .decode(&self.buffer[start + 1..end])
            .unwrap_or_default();
        self.buffer.drain(..=end);
        Some(decoded)
    }
}

// --- payload codec -------------------------------------------------------

/// Reads typed little-endian words off a payload.
pub struct PayloadReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PayloadReader<'a> {
    #[must_use]
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(payload),
        }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.cursor.read_u8()
    }

    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.cursor.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.cursor.read_u16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.cursor.read_u32::<LittleEndian>()
    }

    #[cfg(not(feature = "f32"))]
    pub fn read_scalar(&mut self) -> io::Result<Scalar> {
        self.cursor.read_f64::<LittleEndian>()
    }

    #[cfg(feature = "f32")]
    pub fn read_scalar(&mut self) -> io::Result<Scalar> {
        self.cursor.read_f32::<LittleEndian>()
    }

    pub fn read_vec3(&mut self) -> io::Result<Vec3> {
        Ok(Vec3::new(
            self.read_scalar()?,
            self.read_scalar()?,
            self.read_scalar()?,
        ))
    }

    /// Full sphere record: position, velocity, acceleration, mass, radius.
    pub fn read_full_sphere(&mut self) -> io::Result<Sphere> {
        Ok(Sphere {
            pos: self.read_vec3()?,
            vel: self.read_vec3()?,
            acc: self.read_vec3()?,
            mass: self.read_scalar()?,
            radius: self.read_scalar()?,
        })
    }
}

/// Builds little-endian payloads.
#[derive(Default)]
pub struct PayloadWriter {
    bytes: Vec<u8>,
}

impl PayloadWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.bytes.write_u8(value).expect("vec write");
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.bytes.write_u16::<LittleEndian>(value).expect("vec write");
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.bytes.write_u32::<LittleEndian>(value).expect("vec write");
        self
    }

    #[cfg(not(feature = "f32"))]
    pub fn write_scalar(&mut self, value: Scalar) -> &mut Self {
        self.bytes.write_f64::<LittleEndian>(value).expect("vec write");
        self
    }

    #[cfg(feature = "f32")]
    pub fn write_scalar(&mut self, value: Scalar) -> &mut Self {
        self.bytes.write_f32::<LittleEndian>(value).expect("vec write");
        self
    }

    pub fn write_vec3(&mut self, value: Vec3) -> &mut Self {
        self.write_scalar(value.x)
            .write_scalar(value.y)
            .write_scalar(value.z)
    }

    /// Full sphere record: position, velocity, acceleration, mass, radius.
    pub fn write_full_sphere(&mut self, sphere: &Sphere) -> &mut Self {
        self.write_vec3(sphere.pos)
            .write_vec3(sphere.vel)
            .write_vec3(sphere.acc)
            .write_scalar(sphere.mass)
            .write_scalar(sphere.radius)
    }
}

/// Encodes a frame-stream message: `u16 count`, then `(u16 index, pos)`
/// per sphere. The `words` slice carries `(index, px, py, pz)` quadruples
/// as drained from the outbound ring.
#[must_use]
pub fn encode_frame_message(words: &[Scalar]) -> Vec<u8> {
    let count = words.len() / 4;
    let mut payload = PayloadWriter::new();
    payload.write_u16(count as u16);
    for quad in words.chunks_exact(4) {
        payload.write_u16(quad[0] as u16);
        payload
            .write_scalar(quad[1])
            .write_scalar(quad[2])
            .write_scalar(quad[3]);
    }
    encode_message(group::FRAME, 0, &payload.into_bytes())
}
