//! End-to-end test over a real socket: connect, drive a short session,
//! receive a frame from the stream.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use server::protocol::{
    basic, calculation, encode_message, group, spheres_updating, MessageDecoder, PayloadReader,
    PayloadWriter,
};

struct Client {
    stream: TcpStream,
    decoder: MessageDecoder,
}

impl Client {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Self {
            stream,
            decoder: MessageDecoder::new(),
        }
    }

    fn send(&mut self, group: u8, action: u8, payload: &[u8]) {
        self.stream
            .write_all(&encode_message(group, action, payload))
            .expect("send");
    }

    fn receive(&mut self) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut buffer = [0u8; 4096];
        loop {
            if let Some(message) = self.decoder.next_message() {
                return message;
            }
            assert!(Instant::now() < deadline, "timed out waiting for a message");
            let read = self.stream.read(&mut buffer).expect("read");
            assert!(read > 0, "server closed the connection");
            self.decoder.push(&buffer[..read]);
        }
    }

    fn request(&mut self, group: u8, action: u8, payload: &[u8]) -> Vec<u8> {
        self.send(group, action, payload);
        self.receive()
    }
}

#[test]
fn session_round_trip_with_frame_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let _ = server::net::serve(&listener, 60);
    });

    let mut client = Client::connect(addr);

    assert_eq!(
        client.request(group::BASIC, basic::GET_TRUE_STRING, &[]),
        b"true"
    );

    let count = client.request(group::SPHERES_UPDATING, spheres_updating::ADD_ONE, &[]);
    assert_eq!(PayloadReader::new(&count).read_u16().unwrap(), 1);

    let mut update = PayloadWriter::new();
    update.write_u16(0);
    let mut sphere = physics::Sphere::new(physics::Vec3::new(0.5, 0.5, 0.5), 1.0, 0.1);
    sphere.vel = physics::Vec3::new(0.0, 0.1, 0.0);
    update.write_full_sphere(&sphere);
    client.request(
        group::SPHERES_UPDATING,
        spheres_updating::UPDATE_ONE,
        &update.into_bytes(),
    );

    // Turn on frame sending and run a bounded job; an unsolicited frame
    // message must arrive alongside the replies.
    client.send(group::CALCULATION, calculation::UPDATE_FRAME_SENDING, &[1]);
    client.receive();
    let mut steps = PayloadWriter::new();
    steps.write_u32(5);
    client.send(
        group::CALCULATION,
        calculation::DO_SOME_STEPS,
        &steps.into_bytes(),
    );

    let mut saw_frame = false;
    for _ in 0..10 {
        let message = client.receive();
        // Replies here are at most a u32; frame messages are far longer.
        if message.first() == Some(&group::FRAME) && message.len() > 8 {
            let mut reader = PayloadReader::new(&message[2..]);
            assert_eq!(reader.read_u16().unwrap(), 1);
            assert_eq!(reader.read_u16().unwrap(), 0);
            saw_frame = true;
            break;
        }
    }
    assert!(saw_frame, "no frame message received");
}
