//! Wire-format tests for the three serial codecs

use relay_bridge::codec::crc::{crc16_reflected, crc16_table};
use relay_bridge::codec::heating::{decode_response, HeatingController, QUERY, RESPONSE_LEN};
use relay_bridge::codec::relay::{encode_relay_states, states_to_mask};
use relay_bridge::codec::{MeterTelegramCodec, RelayBoardCodec, RelayFrame};
use relay_bridge::hal::{MockClock, MockSerial};
use relay_bridge::{CodecError, SerialPort};

const TELEGRAM: &[u8] = b"/ISk5\\2MT382-1000\r\n\
\r\n\
1-3:0.2.8(50)\r\n\
0-0:1.0.0(101209113020W)\r\n\
1-0:1.8.1(123456.789*kWh)\r\n\
1-0:1.8.2(002345.678*kWh)\r\n\
1-0:1.7.0(01.193*kW)\r\n\
0-1:24.2.1(101209112500W)(12785.123*m3)\r\n\
!E060\r\n";

fn heating_response() -> [u8; RESPONSE_LEN] {
    let mut frame = [0u8; RESPONSE_LEN];
    frame[0] = 0x02;
    for (i, b) in frame.iter_mut().enumerate().take(62).skip(1) {
        *b = (i * 7) as u8;
    }
    frame[21] = 0x08;
    frame[22] = 0x66;
    frame[27] = 0x07;
    frame[28] = 0xD0;
    frame[62] = 0x17;
    frame[63] = 0x03;
    frame
}

// ============================================================================
// Relay Board
// ============================================================================

#[test]
fn relay_states_round_trip() {
    let mask = states_to_mask([true, false, true, true]);
    assert_eq!(mask, 0b1101);

    let frame = encode_relay_states(mask);
    assert_eq!(frame, [0xA0, 0x04, 0b1101, 0xA1]);
    assert_eq!(RelayFrame::decode(&frame), Ok(RelayFrame::States(0b1101)));
}

#[test]
fn bad_end_marker_then_good_frame() {
    let mut codec = RelayBoardCodec::new();
    assert!(codec.push_bytes(&[0xA0, 0x00, 0x0F, 0x55]).is_empty());
    assert_eq!(
        codec.push_bytes(&[0xA0, 0x04, 0x02, 0xA1]),
        [RelayFrame::States(0x02)]
    );
}

#[test]
fn unknown_command_is_rejected_whole() {
    assert_eq!(
        RelayFrame::decode(&[0xA0, 0x10, 0xFF, 0xA1]),
        Err(CodecError::UnknownCommand(0x10))
    );
}

#[test]
fn frames_split_across_reads() {
    let mut serial = MockSerial::new();
    let mut codec = RelayBoardCodec::new();

    serial.feed(&[0xA0, 0xF5]);
    assert!(codec.receive(&mut serial).is_empty());
    serial.feed(&[0x00, 0xA1, 0xA0, 0xF6, 0x00, 0xA1]);
    assert_eq!(
        codec.receive(&mut serial),
        [RelayFrame::Stuck, RelayFrame::Unstuck]
    );
    assert_eq!(serial.available(), 0);
}

// ============================================================================
// Meter Telegram
// ============================================================================

#[test]
fn telegram_crc_matches_embedded_value() {
    let end = TELEGRAM.iter().position(|&b| b == b'!').unwrap();
    assert_eq!(crc16_reflected(&TELEGRAM[..=end]), 0xE060);
}

#[test]
fn telegram_fields_are_extracted() {
    let mut serial = MockSerial::new();
    serial.feed(TELEGRAM);
    let readings = MeterTelegramCodec::new().receive(&mut serial);

    assert_eq!(readings.len(), 1);
    let reading = &readings[0];
    assert_eq!(reading.tariff1, "123456.789");
    assert_eq!(reading.tariff2, "002345.678");
    assert_eq!(reading.gas, "12785.123");
    assert_eq!(reading.gas_timestamp, "101209112500");
}

#[test]
fn any_altered_byte_suppresses_the_reading() {
    let end = TELEGRAM.iter().position(|&b| b == b'!').unwrap();
    for index in [1, 40, end - 3] {
        let mut telegram = TELEGRAM.to_vec();
        telegram[index] ^= 0x01;

        let results = MeterTelegramCodec::new().push_bytes(&telegram);
        assert_eq!(results.len(), 1, "byte {}", index);
        assert!(
            matches!(results[0], Err(CodecError::ChecksumMismatch { .. })),
            "byte {}",
            index
        );
    }
}

#[test]
fn lines_outside_a_telegram_are_ignored() {
    let mut bytes = b"1-0:1.8.1(999999.999*kWh)\r\n!FFFF\r\n".to_vec();
    bytes.extend_from_slice(TELEGRAM);
    let results = MeterTelegramCodec::new().push_bytes(&bytes);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap().tariff1, "123456.789");
}

// ============================================================================
// Heating Controller
// ============================================================================

#[test]
fn heating_crc_high_byte_matches() {
    let frame = heating_response();
    assert_eq!((crc16_table(&frame[1..62]) >> 8) as u8, frame[62]);

    let reading = decode_response(&frame).unwrap();
    assert_eq!(reading.temperature_celsius(), 21.5);
    assert_eq!(reading.setpoint_celsius(), 20.0);
}

#[test]
fn heating_bit_flip_fails() {
    for index in [1, 21, 61] {
        let mut frame = heating_response();
        frame[index] ^= 0x10;
        assert!(
            matches!(decode_response(&frame), Err(CodecError::ChecksumMismatch { .. })),
            "byte {}",
            index
        );
    }
}

#[test]
fn heating_poll_waits_for_interval() {
    let mut serial = MockSerial::new();
    serial.reply_with(&heating_response());
    let mut clock = MockClock::new();
    let mut controller = HeatingController::new(30_000, 250);

    assert!(controller.poll(&mut serial, &mut clock, 29_999).is_none());
    assert!(serial.tx.is_empty());

    let reading = controller.poll(&mut serial, &mut clock, 30_000).unwrap();
    assert_eq!(reading.temperature, 2150);
    assert_eq!(serial.take_tx(), QUERY);
    assert_eq!(clock.total_delay_ms, 250);

    assert!(controller.poll(&mut serial, &mut clock, 45_000).is_none());
}

#[test]
fn heating_poll_skips_noise_before_sync() {
    let mut reply = vec![0xFF, 0x13];
    reply.extend_from_slice(&heating_response());
    let mut serial = MockSerial::new();
    serial.reply_with(&reply);
    // Stale bytes from before the query are dropped
    serial.feed(&[0x02, 0x02, 0x02]);

    let mut clock = MockClock::new();
    let mut controller = HeatingController::default();
    let reading = controller.poll(&mut serial, &mut clock, 30_000);
    assert_eq!(reading.map(|r| r.setpoint), Some(2000));
}

#[test]
fn heating_short_response_is_soft_failure() {
    let mut serial = MockSerial::new();
    serial.reply_with(&heating_response()[..40]);
    let mut clock = MockClock::new();
    let mut controller = HeatingController::default();
    assert!(controller.poll(&mut serial, &mut clock, 30_000).is_none());
    assert!(controller.last_reading().is_none());
}
