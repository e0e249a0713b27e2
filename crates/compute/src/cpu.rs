//! Built-in CPU hashing backend.

use sha2::{Digest, Sha256, Sha512};

use crate::api::{ComputeBackend, ComputeError, ComputeSession};

/// Hashes per [`ComputeSession::step`] call. Small enough that pause and
/// shutdown are picked up promptly, large enough to keep loop overhead
/// negligible.
const BATCH_SIZE: u64 = 2048;

#[derive(Debug)]
enum HashAlgo {
    Sha256,
    Sha512,
}

/// CPU-bound chained-hashing backend.
///
/// Mostly useful for exercising the bridge without an external compute
/// library: it produces real work and real hash counts but submits
/// nothing anywhere.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn start(
        &self,
        algorithm: &str,
        threads: u32,
    ) -> Result<Box<dyn ComputeSession>, ComputeError> {
        if threads == 0 {
            return Err(ComputeError::InvalidInput("thread count must be resolved"));
        }
        let algo = match algorithm {
            "sha256" => HashAlgo::Sha256,
            "sha512" => HashAlgo::Sha512,
            other => return Err(ComputeError::UnsupportedAlgorithm(other.to_string())),
        };
        Ok(Box::new(CpuSession {
            algo,
            state: [0u8; 64],
            counter: 0,
        }))
    }
}

#[derive(Debug)]
struct CpuSession {
    algo: HashAlgo,
    state: [u8; 64],
    counter: u64,
}

impl ComputeSession for CpuSession {
    fn step(&mut self) -> Result<u64, ComputeError> {
        for _ in 0..BATCH_SIZE {
            self.counter = self.counter.wrapping_add(1);
            match self.algo {
                HashAlgo::Sha256 => {
                    let mut hasher = Sha256::new();
                    hasher.update(&self.state[..32]);
                    hasher.update(self.counter.to_le_bytes());
                    self.state[..32].copy_from_slice(&hasher.finalize());
                }
                HashAlgo::Sha512 => {
                    let mut hasher = Sha512::new();
                    hasher.update(self.state);
                    hasher.update(self.counter.to_le_bytes());
                    self.state.copy_from_slice(&hasher.finalize());
                }
            }
        }
        Ok(BATCH_SIZE)
    }

    fn stop(&mut self) {
        self.state = [0u8; 64];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_reports_batch_size() {
        let backend = CpuBackend;
        let mut session = backend.start("sha256", 1).expect("start");
        assert_eq!(session.step().expect("step"), BATCH_SIZE);
        session.stop();
    }

    #[test]
    fn sha512_advances_state() {
        let backend = CpuBackend;
        let mut session = backend.start("sha512", 2).expect("start");
        session.step().expect("step");
        session.stop();
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let backend = CpuBackend;
        match backend.start("scrypt", 1) {
            Err(ComputeError::UnsupportedAlgorithm(name)) => assert_eq!(name, "scrypt"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn zero_threads_is_rejected() {
        let backend = CpuBackend;
        assert!(matches!(
            backend.start("sha256", 0),
            Err(ComputeError::InvalidInput(_))
        ));
    }
}
