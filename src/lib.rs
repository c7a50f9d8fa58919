pub mod context;
pub mod definitions;
pub mod export;
pub mod formula;
pub mod instruction;
pub mod matcher;
pub mod meson;
pub mod provers;
pub mod reasoner;
pub mod reduce;
pub mod state;
pub mod unfold;

#[cfg(test)]
mod tests;
