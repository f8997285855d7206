use super::*;

mod chunking;
mod dispatcher;
mod duplicates;
mod formulas;
