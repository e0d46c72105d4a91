/// A trait for accessing data about the current run's PE layout
pub trait BenchEnv {
    /// Return the PE id of the caller
    fn my_pe(&self) -> usize;

    /// Return the number of PEs in the run
    fn num_pes(&self) -> usize;
}
