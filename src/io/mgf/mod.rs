mod writer;

pub use writer::MGFWriter;
