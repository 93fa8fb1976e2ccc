//! Thread state.
//!
//! Manages the active thread, message history, and token usage tracking.

use zdx_core::core::thread_log::{ThreadLog, Usage};
use zdx_core::models::ModelPricing;
use zdx_core::providers::ChatMessage;

use crate::mutations::ThreadMutation;

/// Thread state.
///
/// Encapsulates the active thread, message history, and usage tracking.
pub struct ThreadState {
    /// Active thread for persistence (if enabled).
    pub thread_log: Option<ThreadLog>,

    /// Cached thread title (if known).
    pub title: Option<String>,

    /// Thread messages (API format).
    pub messages: Vec<ChatMessage>,

    /// Cumulative token usage for this thread.
    pub usage: ThreadUsage,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadState {
    /// Creates a new ThreadState with no active thread.
    pub fn new() -> Self {
        Self {
            thread_log: None,
            title: None,
            messages: Vec::new(),
            usage: ThreadUsage::new(),
        }
    }

    /// Creates a ThreadState with an active thread and message history.
    pub fn with_thread(thread_log: Option<ThreadLog>, messages: Vec<ChatMessage>) -> Self {
        let title = thread_log
            .as_ref()
            .and_then(|log| zdx_core::core::thread_log::read_thread_title(&log.id).ok())
            .flatten();
        Self {
            thread_log,
            title,
            messages,
            usage: ThreadUsage::new(),
        }
    }

    /// Applies a cross-slice thread mutation.
    pub fn apply(&mut self, mutation: ThreadMutation) {
        match mutation {
            ThreadMutation::ClearMessages => self.messages.clear(),
            ThreadMutation::SetMessages(messages) => self.messages = messages,
            ThreadMutation::AppendMessage(message) => self.messages.push(message),
            ThreadMutation::SetThread(thread_log) => {
                self.thread_log = thread_log;
                if self.thread_log.is_none() {
                    self.title = None;
                }
            }
            ThreadMutation::ResetUsage => self.usage = ThreadUsage::new(),
            ThreadMutation::SetUsage { cumulative, latest } => {
                self.usage = ThreadUsage::new();
                self.usage.restore(cumulative, latest);
            }
            ThreadMutation::SetTitle(title) => self.title = title,
            ThreadMutation::UpdateUsage {
                input,
                output,
                cache_read,
                cache_write,
            } => self.usage.add(input, output, cache_read, cache_write),
        }
    }
}

/// Token usage for the current thread.
///
/// Tracks both cumulative tokens (for cost calculation) and latest request
/// tokens (for context window percentage).
///
/// The distinction matters because each API request's `input_tokens` already
/// includes all previous thread history. Summing across requests would
/// double-count, but we need cumulative totals for accurate cost calculation.
#[derive(Debug, Clone, Default)]
pub struct ThreadUsage {
    // ========================================================================
    // Cumulative totals (for cost calculation and token breakdown display)
    // ========================================================================
    /// Total input tokens (non-cached) across all requests
    pub input_tokens: u64,
    /// Total output tokens across all requests
    pub output_tokens: u64,
    /// Total tokens read from cache across all requests
    pub cache_read_tokens: u64,
    /// Total tokens written to cache across all requests
    pub cache_write_tokens: u64,

    // ========================================================================
    // Current turn (for persistence as per-turn deltas)
    // ========================================================================
    /// Input tokens for current turn (reset on new turn)
    turn_input: u64,
    /// Output tokens for current turn (accumulated during turn)
    turn_output: u64,
    /// Cache read tokens for current turn
    turn_cache_read: u64,
    /// Cache write tokens for current turn
    turn_cache_write: u64,

    // ========================================================================
    // Latest request (for context window percentage)
    // ========================================================================
    /// Total input tokens from latest request (input + cache_read + cache_write)
    latest_input: u64,
    /// Output tokens from latest request
    latest_output: u64,

    // ========================================================================
    // Save tracking (to ensure interrupted requests are persisted)
    // ========================================================================
    /// Whether the current request's usage has been saved to disk.
    /// Set to false when a new request starts (input tokens arrive).
    /// Set to true when usage is saved via `mark_saved()`.
    request_saved: bool,
}

impl ThreadUsage {
    /// Creates a new empty ThreadUsage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds usage from a single API response.
    ///
    /// Updates cumulative totals (for cost), turn values (for persistence),
    /// and latest values (for context %).
    ///
    /// Note: Usage updates for a single API request come in two parts:
    /// 1. MessageStart: input_tokens, cache_read, cache_write (output_tokens=0)
    /// 2. MessageDelta: output_tokens (other fields=0)
    ///
    /// We accumulate the latest values to handle split updates correctly.
    pub fn add(&mut self, input: u64, output: u64, cache_read: u64, cache_write: u64) {
        // Cumulative totals for cost calculation
        self.input_tokens += input;
        self.output_tokens += output;
        self.cache_read_tokens += cache_read;
        self.cache_write_tokens += cache_write;

        // Latest request for context window calculation
        // Accumulate (don't replace) to handle split updates from MessageStart + MessageDelta
        if input > 0 || cache_read > 0 || cache_write > 0 {
            // This is a new request (MessageStart) - reset and set input
            self.latest_input = input + cache_read + cache_write;
            self.latest_output = 0; // Will be updated by MessageDelta

            // Reset turn tracking for new turn
            self.turn_input = input;
            self.turn_output = 0;
            self.turn_cache_read = cache_read;
            self.turn_cache_write = cache_write;

            // Mark as unsaved - this request needs to be persisted
            self.request_saved = false;
        }
        if output > 0 {
            // This is the output update (MessageDelta) - add to latest
            self.latest_output += output;
            self.turn_output += output;
        }
    }

    /// Returns the current turn's usage values for persistence.
    ///
    /// These are per-request deltas (not cumulative) for event-sourcing style storage.
    pub fn turn_usage(&self) -> Usage {
        Usage::new(
            self.turn_input,
            self.turn_output,
            self.turn_cache_read,
            self.turn_cache_write,
        )
    }

    /// Marks the current request's usage as saved.
    ///
    /// Called after persisting usage to disk. Resets turn values and sets
    /// the saved flag to prevent duplicate saves.
    pub fn mark_saved(&mut self) {
        self.request_saved = true;
        // Reset turn values since they've been persisted
        self.turn_input = 0;
        self.turn_output = 0;
        self.turn_cache_read = 0;
        self.turn_cache_write = 0;
    }

    /// Returns true if there's unsaved usage that should be persisted.
    ///
    /// This handles the case where a request is interrupted before output
    /// tokens arrive - we still want to save the input tokens that were consumed.
    pub fn has_unsaved_usage(&self) -> bool {
        !self.request_saved && self.turn_usage().total() > 0
    }

    /// Restores usage state from persisted thread data.
    ///
    /// Called when loading a thread. Sets both cumulative totals (for cost display)
    /// and latest values (for context % display).
    pub fn restore(&mut self, cumulative: Usage, latest: Usage) {
        // Set cumulative totals
        self.input_tokens = cumulative.input;
        self.output_tokens = cumulative.output;
        self.cache_read_tokens = cumulative.cache_read;
        self.cache_write_tokens = cumulative.cache_write;

        // Set latest for context window calculation
        self.latest_input = latest.context_input();
        self.latest_output = latest.output;

        // Turn values are not needed after restore (no pending save)
        self.turn_input = 0;
        self.turn_output = 0;
        self.turn_cache_read = 0;
        self.turn_cache_write = 0;
    }

    /// Context tokens for the latest request (for context window percentage).
    ///
    /// Per Anthropic's documentation, the context window validation is:
    /// > "if the sum of prompt tokens and output tokens exceeds the model's
    /// > context window, the system will return a validation error"
    ///
    /// This applies to a single request, not cumulative across turns.
    /// Each request's `input_tokens` already includes all previous thread
    /// history, so we only need the latest request's tokens.
    ///
    /// Source: https://docs.anthropic.com/en/docs/build-with-claude/context-windows
    pub fn context_tokens(&self) -> u64 {
        self.latest_input + self.latest_output
    }

    /// Total cumulative tokens across all requests (for display/debugging).
    ///
    /// Note: This is NOT the context window usage. Use `context_tokens()` for that.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_write_tokens
    }

    /// Calculates the percentage of context window used.
    ///
    /// Uses all tokens (input + output + cache) per Anthropic's documentation.
    pub fn context_percentage(&self, context_limit: u64) -> f64 {
        if context_limit == 0 {
            return 0.0;
        }
        (self.context_tokens() as f64 / context_limit as f64) * 100.0
    }

    /// Calculates the total cost for this thread in USD.
    ///
    /// Uses the pricing from the model (prices are per million tokens).
    pub fn calculate_cost(&self, pricing: &ModelPricing) -> f64 {
        let million = 1_000_000.0;

        let input_cost = (self.input_tokens as f64 / million) * pricing.input;
        let output_cost = (self.output_tokens as f64 / million) * pricing.output;
        let cache_read_cost = (self.cache_read_tokens as f64 / million) * pricing.cache_read;
        let cache_write_cost = (self.cache_write_tokens as f64 / million) * pricing.cache_write;

        input_cost + output_cost + cache_read_cost + cache_write_cost
    }

    /// Calculates the cost savings from cache hits.
    ///
    /// Returns the amount saved by using cache_read instead of regular input pricing.
    pub fn cache_savings(&self, pricing: &ModelPricing) -> f64 {
        let million = 1_000_000.0;

        // Savings = what we would have paid at input price - what we actually paid at cache_read price
        let would_have_paid = (self.cache_read_tokens as f64 / million) * pricing.input;
        let actually_paid = (self.cache_read_tokens as f64 / million) * pricing.cache_read;

        would_have_paid - actually_paid
    }

    /// Formats token count for display (e.g., "12.5k" or "1.2M").
    pub fn format_tokens(count: u64) -> String {
        if count >= 1_000_000 {
            format!("{:.1}M", count as f64 / 1_000_000.0)
        } else if count >= 1_000 {
            format!("{:.1}k", count as f64 / 1_000.0)
        } else {
            count.to_string()
        }
    }

    /// Formats a context limit for display (e.g., "200k").
    pub fn format_context_limit(limit: u64) -> String {
        if limit >= 1_000_000 {
            format!("{:.0}M", limit as f64 / 1_000_000.0)
        } else if limit >= 1_000 {
            format!("{:.0}k", limit as f64 / 1_000.0)
        } else {
            limit.to_string()
        }
    }

    /// Formats a cost for display (e.g., "$0.008").
    pub fn format_cost(cost: f64) -> String {
        if cost < 0.001 {
            format!("${:.4}", cost)
        } else if cost < 0.01 {
            format!("${:.3}", cost)
        } else {
            format!("${:.2}", cost)
        }
    }
}
