//! # Fixed-size wire codec
//!
//! A message is packed into a flat little-endian record:
//!
//! | Offset | Size | Field                       |
//! |--------|------|-----------------------------|
//! | 0      | 2    | command tag                 |
//! | 2      | 1    | reply channel name length   |
//! | 3      | 31   | reply channel name (padded) |
//! | 34     | 56   | payload union               |
//!
//! The record is not self-describing, the payload is interpreted using the command tag alone.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};

use super::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum length of a reply channel name in bytes.
pub const MAX_REPLY_NAME_LEN: usize = 31;

/// Size of the payload union, set by the largest payload (autonomous parameters).
pub const PAYLOAD_SIZE: usize = 56;

/// Size of an encoded message.
pub const MESSAGE_SIZE: usize = 3 + MAX_REPLY_NAME_LEN + PAYLOAD_SIZE;

const PAYLOAD_OFFSET: usize = 3 + MAX_REPLY_NAME_LEN;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sequential writer over the payload area.
struct Packer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

/// Sequential reader over the payload area.
struct Unpacker<'a> {
    buf: &'a [u8],
    pos: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Message {
    /// Pack the message into its wire record.
    pub fn encode(&self) -> Result<[u8; MESSAGE_SIZE], MessageError> {
        let mut frame = [0u8; MESSAGE_SIZE];

        LittleEndian::write_u16(&mut frame[0..2], self.command as u16);

        if let Some(ref name) = self.reply_to {
            let bytes = name.as_bytes();
            if bytes.len() > MAX_REPLY_NAME_LEN {
                return Err(MessageError::ReplyNameTooLong(name.clone()));
            }
            frame[2] = bytes.len() as u8;
            frame[3..3 + bytes.len()].copy_from_slice(bytes);
        }

        let mut p = Packer {
            buf: &mut frame[PAYLOAD_OFFSET..],
            pos: 0,
        };

        match self.payload {
            Payload::None => (),
            Payload::TankDrive(t) => {
                p.f64(t.left);
                p.f64(t.right);
            }
            Payload::CheezyDrive(c) => {
                p.f64(c.wheel);
                p.f64(c.throttle);
                p.bool(c.quickturn);
            }
            Payload::SplitArcade(s) => {
                p.f64(s.wheel);
                p.f64(s.throttle);
                p.f64(s.spin);
            }
            Payload::Autonomous(a) => {
                p.u32(a.mode);
                p.u32(a.delay);
                p.f64(a.timeout_s);
                p.f64(a.timein_s);
                p.f64(a.drive_speed);
                p.f64(a.drive_distance_in);
                p.f64(a.turn_angle_deg);
                p.f64(a.drive_time_s);
            }
            Payload::Arm(a) => p.bool(a.direction),
            Payload::System(s) => p.f64(s.battery_v),
        }

        Ok(frame)
    }

    /// Unpack a wire record.
    pub fn decode(frame: &[u8]) -> Result<Self, MessageError> {
        if frame.len() != MESSAGE_SIZE {
            return Err(MessageError::InvalidFrameLength(frame.len()));
        }

        let tag = LittleEndian::read_u16(&frame[0..2]);
        let command = match Command::from_tag(tag) {
            Some(c) => c,
            None => return Err(MessageError::UnknownTag(tag)),
        };

        let name_len = frame[2] as usize;
        if name_len > MAX_REPLY_NAME_LEN {
            return Err(MessageError::InvalidReplyName);
        }
        let reply_to = if name_len == 0 {
            None
        } else {
            match std::str::from_utf8(&frame[3..3 + name_len]) {
                Ok(s) => Some(s.to_string()),
                Err(_) => return Err(MessageError::InvalidReplyName),
            }
        };

        let mut u = Unpacker {
            buf: &frame[PAYLOAD_OFFSET..],
            pos: 0,
        };

        let payload = match command.payload_kind() {
            PayloadKind::None => Payload::None,
            PayloadKind::TankDrive => Payload::TankDrive(TankDriveParams {
                left: u.f64(),
                right: u.f64(),
            }),
            PayloadKind::CheezyDrive => Payload::CheezyDrive(CheezyDriveParams {
                wheel: u.f64(),
                throttle: u.f64(),
                quickturn: u.bool(),
            }),
            PayloadKind::SplitArcade => Payload::SplitArcade(SplitArcadeParams {
                wheel: u.f64(),
                throttle: u.f64(),
                spin: u.f64(),
            }),
            PayloadKind::Autonomous => Payload::Autonomous(AutonomousParams {
                mode: u.u32(),
                delay: u.u32(),
                timeout_s: u.f64(),
                timein_s: u.f64(),
                drive_speed: u.f64(),
                drive_distance_in: u.f64(),
                turn_angle_deg: u.f64(),
                drive_time_s: u.f64(),
            }),
            PayloadKind::Arm => Payload::Arm(ArmParams {
                direction: u.bool(),
            }),
            PayloadKind::System => Payload::System(SystemParams {
                battery_v: u.f64(),
            }),
        };

        Ok(Message {
            command,
            reply_to,
            payload,
        })
    }
}

impl<'a> Packer<'a> {
    fn f64(&mut self, v: f64) {
        LittleEndian::write_f64(&mut self.buf[self.pos..self.pos + 8], v);
        self.pos += 8;
    }

    fn u32(&mut self, v: u32) {
        LittleEndian::write_u32(&mut self.buf[self.pos..self.pos + 4], v);
        self.pos += 4;
    }

    fn bool(&mut self, v: bool) {
        self.buf[self.pos] = v as u8;
        self.pos += 1;
    }
}

impl<'a> Unpacker<'a> {
    fn f64(&mut self) -> f64 {
        let v = LittleEndian::read_f64(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        v
    }

    fn u32(&mut self) -> u32 {
        let v = LittleEndian::read_u32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        v
    }

    fn bool(&mut self) -> bool {
        let v = self.buf[self.pos] != 0;
        self.pos += 1;
        v
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_turn_with_reply() {
        let msg = Message::new(
            Command::DrivetrainTurn,
            Payload::Autonomous(AutonomousParams {
                turn_angle_deg: -45.0,
                timeout_s: 2.5,
                ..Default::default()
            }),
        )
        .unwrap()
        .with_reply_to("auto_reply");

        let frame = msg.encode().unwrap();
        assert_eq!(frame.len(), MESSAGE_SIZE);
        assert_eq!(LittleEndian::read_u16(&frame[0..2]), 46);

        assert_eq!(Message::decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_payload_follows_tag() {
        // Same payload bytes read under a different tag give that tag's shape
        let msg = Message::new(
            Command::DrivetrainDriveTank,
            Payload::TankDrive(TankDriveParams {
                left: 0.25,
                right: 0.75,
            }),
        )
        .unwrap();
        let mut frame = msg.encode().unwrap();
        LittleEndian::write_u16(&mut frame[0..2], Command::DrivetrainAutoMove as u16);

        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(decoded.command, Command::DrivetrainAutoMove);
        assert_eq!(decoded.tank_drive().unwrap().right, 0.75);
    }

    #[test]
    fn test_bad_frames() {
        let long_name = "a".repeat(MAX_REPLY_NAME_LEN + 1);
        let msg = Message::bare(Command::DrivetrainStop)
            .unwrap()
            .with_reply_to(&long_name);
        assert_eq!(
            msg.encode(),
            Err(MessageError::ReplyNameTooLong(long_name))
        );

        let mut frame = Message::bare(Command::DrivetrainStop).unwrap().encode().unwrap();
        LittleEndian::write_u16(&mut frame[0..2], 4242);
        assert_eq!(Message::decode(&frame), Err(MessageError::UnknownTag(4242)));

        assert_eq!(
            Message::decode(&frame[..10]),
            Err(MessageError::InvalidFrameLength(10))
        );
    }
}
