use physics::{Sphere, Vec3};
use server::protocol::{
    encode_frame_message, encode_message, encode_reply, group, MessageDecoder, PayloadReader,
    PayloadWriter, END_BYTE, START_BYTE,
};

#[test]
fn messages_round_trip_through_the_envelope() {
    let wire = encode_message(group::CALCULATION, 7, &[1, 2, 3]);
    assert_eq!(wire.first(), Some(&START_BYTE));
    assert_eq!(wire.last(), Some(&END_BYTE));

    let mut decoder = MessageDecoder::new();
    decoder.push(&wire);
    let message = decoder.next_message().expect("one message");
    assert_eq!(message, vec![group::CALCULATION, 7, 1, 2, 3]);
    assert!(decoder.next_message().is_none());
}

#[test]
fn split_and_concatenated_frames_decode() {
    let first = encode_message(group::BASIC, 1, &[]);
    let second = encode_message(group::BASIC, 2, &[9]);

    let mut decoder = MessageDecoder::new();
    // Noise before the start byte is discarded.
    decoder.push(b"xx");
    decoder.push(&first[..3]);
    assert!(decoder.next_message().is_none());
    decoder.push(&first[3..]);
    decoder.push(&second);

    assert_eq!(decoder.next_message().unwrap(), vec![group::BASIC, 1]);
    assert_eq!(decoder.next_message().unwrap(), vec![group::BASIC, 2, 9]);
    assert!(decoder.next_message().is_none());
}

#[test]
fn undecodable_bodies_yield_an_empty_message() {
    let mut decoder = MessageDecoder::new();
    let mut wire = vec![START_BYTE];
    wire.extend_from_slice(b"!!!not-base64!!!");
    wire.push(END_BYTE);
    decoder.push(&wire);
    assert_eq!(decoder.next_message().unwrap(), Vec::<u8>::new());
}

#[test]
fn sphere_records_round_trip() {
    let sphere = Sphere {
        pos: Vec3::new(1.0, 2.0, 3.0),
        vel: Vec3::new(4.0, 5.0, 6.0),
        acc: Vec3::new(7.0, 8.0, 9.0),
        mass: 10.0,
        radius: 11.0,
    };
    let mut writer = PayloadWriter::new();
    writer.write_u16(42).write_full_sphere(&sphere);
    let bytes = writer.into_bytes();

    let mut reader = PayloadReader::new(&bytes);
    assert_eq!(reader.read_u16().unwrap(), 42);
    assert_eq!(reader.read_full_sphere().unwrap(), sphere);
}

#[test]
fn truncated_payloads_fail_softly() {
    let mut writer = PayloadWriter::new();
    writer.write_u16(1).write_scalar(0.5);
    let bytes = writer.into_bytes();

    let mut reader = PayloadReader::new(&bytes);
    reader.read_u16().unwrap();
    assert!(reader.read_full_sphere().is_err());
}

#[test]
fn frame_messages_carry_count_index_and_position() {
    let words = [0.0, 0.25, 0.5, 0.75, 1.0, 0.1, 0.2, 0.3];
    let wire = encode_frame_message(&words);

    let mut decoder = MessageDecoder::new();
    decoder.push(&wire);
    let message = decoder.next_message().unwrap();
    assert_eq!(message[0], group::FRAME);

    let mut reader = PayloadReader::new(&message[2..]);
    assert_eq!(reader.read_u16().unwrap(), 2);
    assert_eq!(reader.read_u16().unwrap(), 0);
    assert!((reader.read_scalar().unwrap() - 0.25).abs() < 1e-12);
    assert!((reader.read_scalar().unwrap() - 0.5).abs() < 1e-12);
    assert!((reader.read_scalar().unwrap() - 0.75).abs() < 1e-12);
    assert_eq!(reader.read_u16().unwrap(), 1);
}

#[test]
fn replies_carry_the_payload_alone() {
    let wire = encode_reply(&[5, 6]);
    let mut decoder = MessageDecoder::new();
    decoder.push(&wire);
    assert_eq!(decoder.next_message().unwrap(), vec![5, 6]);
}
