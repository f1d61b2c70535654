//! Persona table: the fixed cast of role-play characters.
//!
//! Every character is a variant of the closed [`PersonaId`] enum. Lookups go
//! through an exhaustive `match`, so adding a persona means adding a profile
//! the compiler forces you to fill in. Unrecognised ids arriving over the wire
//! land on [`PersonaId::Unknown`], which has no profile and switches every
//! augmentation stage off.
//!
//! # Architecture
//!
//! ```text
//! PersonaId ──profile()──► PersonaProfile
//!                            ├─ TalentProfile     → dialogue::talent
//!                            ├─ SkillProfile      → dialogue::skill
//!                            ├─ ExpressiveProfile → dialogue::expressive
//!                            └─ VoiceProfile      → providers::speech
//! ```

pub mod profile;

pub use profile::{
    ExpressiveProfile, PersonaId, PersonaProfile, SkillProfile, SkillVariant, TalentProfile,
    VoiceProfile,
};
