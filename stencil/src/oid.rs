//! Identifier generation.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use std::sync::{
    Arc, LazyLock,
    atomic::{AtomicU32, Ordering},
};

const COUNTER_MODULUS: u32 = 0x100_0000;

/// Produces [`ObjectId`]s from a timestamp, a per-process random value and a
/// wrapping counter.
///
/// The counter starts at a random value and is incremented atomically, so one
/// generator can be shared between threads.
#[derive(Debug)]
pub struct ObjectIdGenerator {
    process: [u8; 5],
    counter: AtomicU32,
}

static GLOBAL: LazyLock<Arc<ObjectIdGenerator>> =
    LazyLock::new(|| Arc::new(ObjectIdGenerator::random()));

impl ObjectIdGenerator {
    /// Generator with a fixed process value and counter seed.
    pub fn new(process: [u8; 5], seed: u32) -> Self {
        Self {
            process,
            counter: AtomicU32::new(seed % COUNTER_MODULUS),
        }
    }

    pub fn random() -> Self {
        Self::new(rand::random(), rand::random())
    }

    /// Process-wide generator, seeded randomly on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    pub fn generate(&self) -> ObjectId {
        let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        self.assemble(seconds)
    }

    /// Identifier that would have been generated at `moment`.
    ///
    /// The timestamp is four unsigned bytes, so moments before 1970 or after
    /// early 2106 are a value error.
    pub fn generate_at(&self, moment: DateTime<Utc>) -> Result<ObjectId> {
        let seconds = u32::try_from(moment.timestamp())
            .map_err(|_| Error::value_error(format!("{moment} is outside the object id range")))?;

        Ok(self.assemble(seconds))
    }

    fn assemble(&self, seconds: u32) -> ObjectId {
        let counter = self
            .counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some((c + 1) % COUNTER_MODULUS)
            })
            .unwrap_or_default();

        let mut bytes = [0; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);

        ObjectId::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn embeds_timestamp_and_process() {
        let generator = ObjectIdGenerator::new([1, 2, 3, 4, 5], 7);
        let moment = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let id = generator.generate_at(moment).unwrap();

        assert_eq!(id.timestamp().timestamp_millis(), moment.timestamp_millis());
        assert_eq!(&id.bytes()[4..9], &[1, 2, 3, 4, 5]);
        assert_eq!(&id.bytes()[9..], &[0, 0, 7]);
    }

    #[test]
    fn counter_wraps() {
        let generator = ObjectIdGenerator::new([0; 5], COUNTER_MODULUS - 1);
        let moment = Utc::now();

        assert_eq!(&generator.generate_at(moment).unwrap().bytes()[9..], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&generator.generate_at(moment).unwrap().bytes()[9..], &[0, 0, 0]);
    }

    #[test]
    fn moments_outside_the_timestamp_range_fail() {
        let generator = ObjectIdGenerator::new([0; 5], 0);
        let before = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2106, 2, 8, 0, 0, 0).unwrap();

        assert!(matches!(generator.generate_at(before), Err(Error::Value(_))));
        assert!(matches!(generator.generate_at(after), Err(Error::Value(_))));
        assert!(generator.generate_at(DateTime::UNIX_EPOCH).is_ok());
    }

    #[test]
    fn consecutive_ids_differ() {
        let generator = ObjectIdGenerator::global();
        assert_ne!(generator.generate(), generator.generate());
    }
}
