//! Session management: the long-lived per-user `ConversationSession` and
//! the crash-restart `AudioSessionManager` that drives its audio-path
//! health state.

pub mod audio_session;
pub mod conversation;

pub use audio_session::{AudioSession, AudioSessionManager, OnConnect, SessionFactory};
pub use conversation::{Announcer, AudioSessionRef, AudioState, ConversationSession};
