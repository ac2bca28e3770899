pub mod fractions;
