use crate::error::{try_alloc, BenchResult};

use itertools::izip;
use std::time::Instant;

/// The four elementwise operations, in the order they are executed and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    pub const ALL: [Op; 4] = [Op::Add, Op::Sub, Op::Mul, Op::Div];

    pub fn name(&self) -> &'static str {
        match self {
            Op::Add => "Addition",
            Op::Sub => "Subtraction",
            Op::Mul => "Multiplication",
            Op::Div => "Division",
        }
    }
}

/// Per operation wall clock durations in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpTimes {
    pub add: f64,
    pub sub: f64,
    pub mul: f64,
    pub div: f64,
}

impl OpTimes {
    pub fn get(&self, op: Op) -> f64 {
        match op {
            Op::Add => self.add,
            Op::Sub => self.sub,
            Op::Mul => self.mul,
            Op::Div => self.div,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.add, self.sub, self.mul, self.div]
    }

    pub fn from_array(times: [f64; 4]) -> OpTimes {
        OpTimes {
            add: times[0],
            sub: times[1],
            mul: times[2],
            div: times[3],
        }
    }

    /// Elementwise maximum, the worst case across PEs.
    pub fn max(&self, other: &OpTimes) -> OpTimes {
        OpTimes {
            add: self.add.max(other.add),
            sub: self.sub.max(other.sub),
            mul: self.mul.max(other.mul),
            div: self.div.max(other.div),
        }
    }

    pub fn scale(&self, factor: f64) -> OpTimes {
        OpTimes {
            add: self.add * factor,
            sub: self.sub * factor,
            mul: self.mul * factor,
            div: self.div * factor,
        }
    }
}

impl std::ops::AddAssign for OpTimes {
    fn add_assign(&mut self, rhs: OpTimes) {
        self.add += rhs.add;
        self.sub += rhs.sub;
        self.mul += rhs.mul;
        self.div += rhs.div;
    }
}

/// Output buffers of the four operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub add: Vec<f64>,
    pub sub: Vec<f64>,
    pub mul: Vec<f64>,
    pub div: Vec<f64>,
}

impl ResultSet {
    pub fn try_new(len: usize, pe: usize) -> BenchResult<ResultSet> {
        Ok(ResultSet {
            add: try_alloc(len, pe)?,
            sub: try_alloc(len, pe)?,
            mul: try_alloc(len, pe)?,
            div: try_alloc(len, pe)?,
        })
    }

    pub fn len(&self) -> usize {
        self.add.len()
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
    }

    pub fn get(&self, op: Op) -> &[f64] {
        match op {
            Op::Add => &self.add,
            Op::Sub => &self.sub,
            Op::Mul => &self.mul,
            Op::Div => &self.div,
        }
    }

    /// Number of indices where any of the four outputs differ from `other`.
    pub fn mismatches(&self, other: &ResultSet) -> usize {
        if self.len() != other.len() {
            return self.len().max(other.len());
        }
        (0..self.len())
            .filter(|&i| {
                Op::ALL
                    .iter()
                    .any(|&op| self.get(op)[i].to_bits() != other.get(op)[i].to_bits())
            })
            .count()
    }
}

#[inline]
fn guarded_div(a: f64, b: f64) -> f64 {
    if b != 0.0 {
        a / b
    } else {
        0.0
    }
}

fn check_lens(a: &[f64], b: &[f64], out: &ResultSet) {
    assert_eq!(a.len(), b.len(), "operand lengths differ");
    assert_eq!(a.len(), out.len(), "output length differs from operands");
}

fn add_pass(a: &[f64], b: &[f64], out: &mut [f64]) {
    for (o, x, y) in izip!(out.iter_mut(), a, b) {
        *o = x + y;
    }
}

fn sub_pass(a: &[f64], b: &[f64], out: &mut [f64]) {
    for (o, x, y) in izip!(out.iter_mut(), a, b) {
        *o = x - y;
    }
}

fn mul_pass(a: &[f64], b: &[f64], out: &mut [f64]) {
    for (o, x, y) in izip!(out.iter_mut(), a, b) {
        *o = x * y;
    }
}

fn div_pass(a: &[f64], b: &[f64], out: &mut [f64]) {
    for (o, x, y) in izip!(out.iter_mut(), a, b) {
        *o = guarded_div(*x, *y);
    }
}

/// `out.add = a + b`, `out.sub = a - b`, `out.mul = a * b`, `out.div = a / b` (0 where `b == 0`).
pub fn array_ops(a: &[f64], b: &[f64], out: &mut ResultSet) {
    check_lens(a, b, out);
    add_pass(a, b, &mut out.add);
    sub_pass(a, b, &mut out.sub);
    mul_pass(a, b, &mut out.mul);
    div_pass(a, b, &mut out.div);
}

/// Same as [array_ops], timing each of the four passes on its own.
pub fn array_ops_timed(a: &[f64], b: &[f64], out: &mut ResultSet) -> OpTimes {
    check_lens(a, b, out);
    let mut times = OpTimes::default();

    let start = Instant::now();
    add_pass(a, b, &mut out.add);
    times.add = start.elapsed().as_secs_f64();

    let start = Instant::now();
    sub_pass(a, b, &mut out.sub);
    times.sub = start.elapsed().as_secs_f64();

    let start = Instant::now();
    mul_pass(a, b, &mut out.mul);
    times.mul = start.elapsed().as_secs_f64();

    let start = Instant::now();
    div_pass(a, b, &mut out.div);
    times.div = start.elapsed().as_secs_f64();

    times
}

pub fn sum_counts(values: &[i32]) -> i64 {
    values.iter().map(|&v| v as i64).sum()
}
