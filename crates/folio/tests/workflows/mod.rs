use folio::{chunk::Chunker, pipeline::Pipeline};

use super::*;

mod duplicate_report;
mod extraction;
mod formula_search;
