use crate::ops::{Op, OpTimes};

use std::fmt;

/// Sequential time divided by parallel time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Speedup {
    Ratio(f64),
    /// The parallel time was zero (or a measurement was not finite), so no ratio exists.
    Undefined,
}

impl Speedup {
    pub fn compute(sequential: f64, parallel: f64) -> Speedup {
        if parallel == 0.0 || !parallel.is_finite() || !sequential.is_finite() {
            Speedup::Undefined
        } else {
            Speedup::Ratio(sequential / parallel)
        }
    }
}

impl fmt::Display for Speedup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Speedup::Ratio(ratio) => write!(f, "{:.2}x", ratio),
            Speedup::Undefined => write!(f, "undefined (parallel time was zero)"),
        }
    }
}

/// Averages of the repeated four operation benchmark, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct OpsReport {
    pub array_size: usize,
    pub num_pes: usize,
    pub iterations: usize,
    pub sequential: OpTimes,
    /// Per operation maximum across PEs, averaged over iterations.
    pub parallel: OpTimes,
    /// Barrier to barrier time of the whole distributed step, averaged over iterations.
    pub distributed_wall: f64,
    /// Whether every gathered result matched the sequential one, when verification ran.
    pub verified: Option<bool>,
}

impl OpsReport {
    pub fn speedup(&self, op: Op) -> Speedup {
        Speedup::compute(self.sequential.get(op), self.parallel.get(op))
    }
}

impl fmt::Display for OpsReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "=== Array Operations Benchmark ===")?;
        writeln!(f, "Array size: {}", self.array_size)?;
        writeln!(f, "Processes: {}", self.num_pes)?;
        writeln!(f, "Iterations: {}", self.iterations)?;

        writeln!(f, "\nAverage sequential times:")?;
        for op in Op::ALL {
            writeln!(f, "{}: {:.6} sec", op.name(), self.sequential.get(op))?;
        }

        writeln!(f, "\nAverage parallel times (max across processes):")?;
        for op in Op::ALL {
            writeln!(f, "{}: {:.6} sec", op.name(), self.parallel.get(op))?;
        }
        writeln!(
            f,
            "Distributed step (scatter, compute, reduce): {:.6} sec",
            self.distributed_wall
        )?;

        writeln!(f, "\nSpeedup factors:")?;
        for op in Op::ALL {
            writeln!(f, "{}: {}", op.name(), self.speedup(op))?;
        }

        if let Some(verified) = self.verified {
            writeln!(
                f,
                "\nVerification: {}",
                if verified { "passed" } else { "FAILED" }
            )?;
        }
        Ok(())
    }
}

/// One row of the gathered results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRow {
    pub index: usize,
    pub add: f64,
    pub sub: f64,
    pub mul: f64,
    pub div: f64,
}

/// A single sequential and distributed run, reported in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleRunReport {
    pub array_size: usize,
    pub num_pes: usize,
    pub sequential: OpTimes,
    pub parallel: OpTimes,
    pub first_rows: Vec<ResultRow>,
    pub verified: bool,
}

impl fmt::Display for SingleRunReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Parallel version results:")?;
        writeln!(f, "Array size: {}", self.array_size)?;
        writeln!(f, "Number of processes: {}", self.num_pes)?;

        writeln!(f, "\nSequential execution times:")?;
        for op in Op::ALL {
            writeln!(
                f,
                "{:<20} {:.3} ms",
                format!("{} time:", op.name()),
                self.sequential.get(op) * 1000.0
            )?;
        }

        writeln!(f, "\nExecution times (max across all processes):")?;
        for op in Op::ALL {
            writeln!(
                f,
                "{:<20} {:.3} ms",
                format!("{} time:", op.name()),
                self.parallel.get(op) * 1000.0
            )?;
        }

        writeln!(f, "\nSpeedup factors:")?;
        for op in Op::ALL {
            writeln!(
                f,
                "{}: {}",
                op.name(),
                Speedup::compute(self.sequential.get(op), self.parallel.get(op))
            )?;
        }

        writeln!(f, "\nFirst {} results:", self.first_rows.len())?;
        for row in &self.first_rows {
            writeln!(
                f,
                "[{}] +:{:.2} -:{:.2} *:{:.2} /:{:.2}",
                row.index, row.add, row.sub, row.mul, row.div
            )?;
        }
        writeln!(
            f,
            "\nVerification: {}",
            if self.verified { "passed" } else { "FAILED" }
        )
    }
}

/// Sequential vs. distributed sum reduction, reported in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SumReport {
    pub array_size: usize,
    pub num_pes: usize,
    pub sequential_sum: i64,
    pub parallel_sum: i64,
    pub sequential_time: f64,
    pub parallel_time: f64,
}

impl SumReport {
    pub fn speedup(&self) -> Speedup {
        Speedup::compute(self.sequential_time, self.parallel_time)
    }
}

impl fmt::Display for SumReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "=== Sequential version ===")?;
        writeln!(f, "Array size: {}", self.array_size)?;
        writeln!(f, "Sum of elements: {}", self.sequential_sum)?;
        writeln!(f, "Execution time: {:.3} ms", self.sequential_time * 1000.0)?;

        writeln!(f, "\n=== Parallel version ===")?;
        writeln!(f, "Array size: {}", self.array_size)?;
        writeln!(f, "Number of processes: {}", self.num_pes)?;
        writeln!(f, "Sum of elements: {}", self.parallel_sum)?;
        writeln!(f, "Execution time: {:.3} ms", self.parallel_time * 1000.0)?;

        writeln!(f, "\nSpeedup: {}", self.speedup())?;
        writeln!(
            f,
            "Sums match: {}",
            if self.sequential_sum == self.parallel_sum {
                "yes"
            } else {
                "NO"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(parallel: OpTimes) -> OpsReport {
        OpsReport {
            array_size: 8,
            num_pes: 2,
            iterations: 3,
            sequential: OpTimes::from_array([0.4, 0.2, 0.3, 0.8]),
            parallel,
            distributed_wall: 0.5,
            verified: None,
        }
    }

    #[test]
    fn speedup_ratio_and_zero_guard() {
        assert_eq!(Speedup::compute(4.0, 2.0), Speedup::Ratio(2.0));
        assert_eq!(Speedup::compute(4.0, 0.0), Speedup::Undefined);
        assert_eq!(Speedup::compute(0.0, 0.0), Speedup::Undefined);
        assert_eq!(Speedup::compute(f64::NAN, 1.0), Speedup::Undefined);
        assert_eq!(Speedup::Ratio(2.3456).to_string(), "2.35x");
    }

    #[test]
    fn ops_report_layout() {
        let text = report(OpTimes::from_array([0.2, 0.1, 0.0, 0.4])).to_string();
        assert!(text.starts_with("=== Array Operations Benchmark ===\n"));
        assert!(text.contains("Array size: 8\n"));
        assert!(text.contains("Processes: 2\n"));
        assert!(text.contains("Iterations: 3\n"));
        assert!(text.contains("Addition: 0.400000 sec\n"));
        assert!(text.contains("Addition: 2.00x\n"));
        assert!(text.contains("Subtraction: 2.00x\n"));
        assert!(text.contains("Multiplication: undefined (parallel time was zero)\n"));
        assert!(text.contains("Division: 2.00x\n"));
        assert!(!text.contains("Verification"));
    }

    #[test]
    fn verification_line() {
        let mut r = report(OpTimes::from_array([0.1; 4]));
        r.verified = Some(true);
        assert!(r.to_string().contains("Verification: passed"));
        r.verified = Some(false);
        assert!(r.to_string().contains("Verification: FAILED"));
    }

    #[test]
    fn single_run_rows() {
        let r = SingleRunReport {
            array_size: 2,
            num_pes: 1,
            sequential: OpTimes::from_array([0.001; 4]),
            parallel: OpTimes::from_array([0.0005; 4]),
            first_rows: vec![ResultRow {
                index: 0,
                add: 3.0,
                sub: -1.0,
                mul: 2.0,
                div: 0.5,
            }],
            verified: true,
        };
        let text = r.to_string();
        assert!(text.contains("Addition time:       0.500 ms\n"));
        assert!(text.contains("[0] +:3.00 -:-1.00 *:2.00 /:0.50\n"));
        assert!(text.contains("Addition: 2.00x"));
    }

    #[test]
    fn sum_report() {
        let r = SumReport {
            array_size: 10,
            num_pes: 2,
            sequential_sum: 45,
            parallel_sum: 45,
            sequential_time: 0.002,
            parallel_time: 0.0,
        };
        let text = r.to_string();
        assert!(text.contains("Sum of elements: 45\n"));
        assert!(text.contains("Speedup: undefined (parallel time was zero)\n"));
        assert!(text.contains("Sums match: yes"));
    }
}
