//! # newsreel
//!
//! Keyword-driven search over videos, news articles, and listed companies,
//! with AI-generated summaries of what was found.
//!
//! A search runs through a fixed pipeline: the provider returns a page of
//! hits, unusable items are filtered out (videos without transcripts, removed
//! articles), the rest are re-sorted and deduplicated, and the outcome is
//! stored in a per-user [`session::Session`]. Summaries, recommendations, and
//! insights are generated from stored items through a [`traits::Summarizer`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌───────────┐
//! │  Providers   │──▶│     Pipeline      │──▶│  Session  │
//! │ YouTube/News │   │ filter→resort→    │   │ results + │
//! │ Market/Gemini│   │ dedupe            │   │ summary   │
//! └──────────────┘   └───────────────────┘   └─────┬─────┘
//!                                                  │
//!                              ┌───────────────────┤
//!                              ▼                   ▼
//!                         ┌──────────┐       ┌──────────┐
//!                         │   CLI    │       │   HTTP   │
//!                         │  (reel)  │       │  (axum)  │
//!                         └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! reel search rust async --period week
//! reel summarize rust async --item 2
//! reel brief semiconductors exports --output out/brief.txt
//! reel stock samsung
//! reel serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`traits`] | Provider seams and the [`traits::Providers`] set |
//! | [`provider_youtube`] | Video search and statistics |
//! | [`provider_transcript`] | Timed-text transcripts |
//! | [`provider_news`] | News article search |
//! | [`provider_market`] | Prices, statements, symbol lookup |
//! | [`summarize`] | Generative providers |
//! | [`pipeline`] | Filter, resort, dedupe |
//! | [`period`] | Publish-date windows |
//! | [`prompt`] | Prompt templates |
//! | [`insight`] | Tags/importance reply parser |
//! | [`session`] | Session state and actions |
//! | [`ticker`] | Background index ticker |
//! | [`export`] | Summary export |
//! | [`server`] | HTTP server |

pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod insight;
pub mod logging;
pub mod models;
pub mod period;
pub mod pipeline;
pub mod prompt;
pub mod provider_market;
pub mod provider_news;
pub mod provider_transcript;
pub mod provider_youtube;
pub mod server;
pub mod session;
pub mod summarize;
pub mod ticker;
pub mod traits;
