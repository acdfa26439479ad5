pub mod gather;
pub mod serve;
pub mod validate;
