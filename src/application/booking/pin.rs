//! Arrival PIN generation

use std::collections::HashSet;

use rand::Rng;

use crate::domain::{DomainError, DomainResult};

pub const PIN_MIN: u32 = 100_000;
pub const PIN_MAX: u32 = 999_999;

const MAX_PIN_ATTEMPTS: usize = 32;

pub trait PinGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform over `[100000, 999999]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPinGenerator;

impl PinGenerator for RandomPinGenerator {
    fn generate(&self) -> String {
        rand::thread_rng().gen_range(PIN_MIN..=PIN_MAX).to_string()
    }
}

/// Draw until the code is not held by another active reservation on the station.
pub fn unique_pin(generator: &dyn PinGenerator, taken: &HashSet<&str>) -> DomainResult<String> {
    for _ in 0..MAX_PIN_ATTEMPTS {
        let pin = generator.generate();
        if !taken.contains(pin.as_str()) {
            return Ok(pin);
        }
    }
    Err(DomainError::ConcurrencyConflict(
        "could not allocate a unique arrival PIN".to_string(),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::PinGenerator;

    /// Hands out a fixed sequence, then repeats the last code.
    pub struct ScriptedPins {
        queue: Mutex<VecDeque<String>>,
        last: Mutex<String>,
    }

    impl ScriptedPins {
        pub fn new(pins: &[&str]) -> Self {
            Self {
                queue: Mutex::new(pins.iter().map(|p| p.to_string()).collect()),
                last: Mutex::new(pins.last().map(|p| p.to_string()).unwrap_or_default()),
            }
        }
    }

    impl PinGenerator for ScriptedPins {
        fn generate(&self) -> String {
            match self.queue.lock().unwrap().pop_front() {
                Some(pin) => {
                    *self.last.lock().unwrap() = pin.clone();
                    pin
                }
                None => self.last.lock().unwrap().clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedPins;
    use super::*;

    #[test]
    fn random_pins_are_six_digits_in_range() {
        let generator = RandomPinGenerator;
        for _ in 0..1_000 {
            let pin = generator.generate();
            assert_eq!(pin.len(), 6);
            let n: u32 = pin.parse().unwrap();
            assert!((PIN_MIN..=PIN_MAX).contains(&n));
        }
    }

    #[test]
    fn unique_pin_skips_codes_in_use() {
        let generator = ScriptedPins::new(&["111111", "222222"]);
        let taken: HashSet<&str> = ["111111"].into_iter().collect();
        assert_eq!(unique_pin(&generator, &taken).unwrap(), "222222");
    }

    #[test]
    fn unique_pin_gives_up_eventually() {
        let generator = ScriptedPins::new(&["111111"]);
        let taken: HashSet<&str> = ["111111"].into_iter().collect();
        let err = unique_pin(&generator, &taken).unwrap_err();
        assert!(err.is_retryable());
    }
}
