//! Domain module - catalog entities and filter vocabulary
//!
//! Pure data types shared by the catalog engine and the infrastructure layer.
//! Nothing in here performs I/O.
//!
//! - `species`: list stubs and resolved detail records
//! - `filters`: filter state, acquisition modes, generation bands
//! - `profile`: flavor text and evolution chain data for the detail page

pub mod filters;
pub mod profile;
pub mod species;

pub use filters::{
    AcquisitionKey, AcquisitionMode, FilterState, Generation, GENERATIONS, KNOWN_CATEGORIES,
    generation, generation_of,
};
pub use profile::{EvolutionNode, EvolutionStep, FlavorTextEntry, SpeciesProfile};
pub use species::{ImageRefs, SpeciesDetail, SpeciesStub};
