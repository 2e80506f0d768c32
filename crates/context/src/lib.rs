//! Prompt-side context assembly.
//!
//! Turns the note store into LLM-ready material: the relevance ranker picks
//! which notes matter for the current editing context, the lore tracker
//! decides which newly observed entities are worth surfacing proactively,
//! and the serializer renders structured bedside content under a token
//! budget.

pub mod novelty;
pub mod ranker;
pub mod serializer;
pub mod token;

pub use novelty::LoreTracker;
pub use ranker::{ContextSignals, RankerOptions, RelevanceRanker, RelevantMemories};
pub use serializer::{serialize_bedside_note_content, SectionBudgets, SectionLimits, SerializeOptions};
pub use token::estimate_tokens;
