mod filters;

pub use filters::SymbolFilters;
