use thiserror::Error;

/// Status reported by a failed collective operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommStatus {
    /// Another PE aborted the run with the given code.
    Aborted(i32),
    /// A peer mailbox went away before the collective completed.
    Disconnected,
    /// The buffer handed to (or received by) the collective has the wrong length.
    LengthMismatch { expected: usize, found: usize },
    /// The payload received was not of the element type this PE expected.
    TypeMismatch,
}

impl CommStatus {
    /// Non-zero status code, the value a failing collective would hand to the abort.
    pub fn code(&self) -> i32 {
        match self {
            CommStatus::Aborted(code) => *code,
            CommStatus::Disconnected => 2,
            CommStatus::LengthMismatch { .. } => 3,
            CommStatus::TypeMismatch => 4,
        }
    }
}

impl std::fmt::Display for CommStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CommStatus::Aborted(code) => write!(f, "run aborted (code {})", code),
            CommStatus::Disconnected => write!(f, "peer disconnected (code {})", self.code()),
            CommStatus::LengthMismatch { expected, found } => write!(
                f,
                "length mismatch, expected {} found {} (code {})",
                expected,
                found,
                self.code()
            ),
            CommStatus::TypeMismatch => write!(f, "payload type mismatch (code {})", self.code()),
        }
    }
}

/// Every fault the benchmark can detect. None of them are recovered locally.
#[derive(Debug, Clone, Error)]
pub enum BenchError {
    #[error("{0}")]
    Config(String),

    #[error("Array size ({array_size}) must be divisible by number of processes ({num_pes})")]
    Indivisible { array_size: usize, num_pes: usize },

    #[error("Memory allocation failed in process {pe} ({elems} elements)")]
    Alloc { pe: usize, elems: usize },

    #[error("Error in {op} in process {pe}: {status}")]
    Collective {
        pe: usize,
        op: &'static str,
        status: CommStatus,
    },

    #[error("Failed to launch process {pe}: {reason}")]
    Spawn { pe: usize, reason: String },

    #[error("Process {pe} panicked")]
    PePanicked { pe: usize },
}

impl BenchError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Collective { status, .. } => status.code(),
            _ => 1,
        }
    }

    /// True for the errors a PE sees only because some other PE already failed.
    pub(crate) fn is_secondary(&self) -> bool {
        matches!(
            self,
            BenchError::Collective {
                status: CommStatus::Aborted(_),
                ..
            }
        )
    }
}

pub type BenchResult<T> = Result<T, BenchError>;

/// Allocate a zeroed buffer of `len` elements, reporting exhaustion instead of aborting.
pub(crate) fn try_alloc<T: Clone + Default>(len: usize, pe: usize) -> BenchResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| BenchError::Alloc { pe, elems: len })?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Fallible `to_vec`.
pub(crate) fn try_to_vec<T: Clone>(src: &[T], pe: usize) -> BenchResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len())
        .map_err(|_| BenchError::Alloc {
            pe,
            elems: src.len(),
        })?;
    buf.extend_from_slice(src);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_non_zero() {
        let errs = [
            BenchError::Config("bad".to_owned()),
            BenchError::Indivisible {
                array_size: 10,
                num_pes: 3,
            },
            BenchError::Alloc { pe: 2, elems: 8 },
            BenchError::Collective {
                pe: 1,
                op: "scatter",
                status: CommStatus::Disconnected,
            },
            BenchError::Spawn {
                pe: 1,
                reason: "out of threads".to_owned(),
            },
            BenchError::PePanicked { pe: 0 },
        ];
        for err in errs.iter() {
            assert_ne!(err.exit_code(), 0, "{}", err);
        }
    }

    #[test]
    fn messages_name_the_pe() {
        let err = BenchError::Collective {
            pe: 3,
            op: "gather",
            status: CommStatus::LengthMismatch {
                expected: 4,
                found: 2,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("gather"));
        assert!(msg.contains("process 3"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn alloc_helpers() {
        let buf: Vec<f64> = try_alloc(5, 0).unwrap();
        assert_eq!(buf, vec![0.0; 5]);
        let copy = try_to_vec(&[1, 2, 3], 0).unwrap();
        assert_eq!(copy, vec![1, 2, 3]);
        assert!(try_alloc::<u64>(usize::MAX, 7).is_err());
    }
}
