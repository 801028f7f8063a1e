pub mod classification;
pub mod entities;
pub mod enums;
pub mod utterance;

pub use classification::*;
pub use entities::*;
pub use enums::*;
pub use utterance::*;
