//! The Switchboard chat turn pipeline.
//!
//! Composes the tri-layer memory assembler, the master router, the provider
//! adapters, and the background summarizer around one inbound message:
//! load state → assemble context → route → generate → persist →
//! background-compact.

pub mod assembler;
pub mod orchestrator;
pub mod stream_event;
pub mod summarizer;

pub use assembler::{AssembledContext, MemoryAssembler, NO_SUMMARY_PLACEHOLDER};
pub use orchestrator::{ChatOrchestrator, TurnRequest, TurnResponse};
pub use stream_event::ChatStreamEvent;
pub use summarizer::{CompactionOutcome, Summarizer};
