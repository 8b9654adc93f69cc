// SPDX-License-Identifier: AGPL-3.0-or-later
//! Format handlers

pub mod markdown;

pub use markdown::MarkdownHandler;
