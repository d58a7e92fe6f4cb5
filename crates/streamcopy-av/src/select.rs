//! Stream selection by media type.

use crate::container::Input;
use crate::types::{Discard, MediaType, StreamInfo};
use crate::{Error, Result};

/// Which streams get their discard flag set when a stream is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscardPolicy {
    /// Leave every discard flag as it is.
    None,
    /// Discard every stream whose media type differs from the target.
    NonMatching,
    /// Discard everything except the selected stream, including later
    /// streams of the target type.
    #[default]
    AllButSelected,
}

/// Index of the first stream of `media_type`, without side effects.
pub fn find_stream(streams: &[StreamInfo], media_type: MediaType) -> Option<usize> {
    streams
        .iter()
        .position(|s| s.media_type() == media_type)
}

/// Select the first stream of `media_type` and apply `policy` to the rest.
///
/// On failure no discard flag is touched.
pub fn select_stream<I: Input>(
    input: &mut I,
    media_type: MediaType,
    policy: DiscardPolicy,
) -> Result<usize> {
    let selected =
        find_stream(input.streams(), media_type).ok_or(Error::StreamNotFound { media_type })?;
    apply_policy(input, selected, media_type, policy);
    Ok(selected)
}

/// Select the backend's best stream of `media_type`, skipping attached
/// pictures, and apply `policy` to the rest.
///
/// On failure no discard flag is touched.
pub fn select_best_stream<I: Input>(
    input: &mut I,
    media_type: MediaType,
    policy: DiscardPolicy,
) -> Result<usize> {
    let selected = input
        .best_stream(media_type)
        .ok_or(Error::StreamNotFound { media_type })?;
    apply_policy(input, selected, media_type, policy);
    Ok(selected)
}

fn apply_policy<I: Input>(
    input: &mut I,
    selected: usize,
    media_type: MediaType,
    policy: DiscardPolicy,
) {
    let muted: Vec<usize> = input
        .streams()
        .iter()
        .filter(|s| s.index != selected)
        .filter(|s| match policy {
            DiscardPolicy::None => false,
            DiscardPolicy::NonMatching => s.media_type() != media_type,
            DiscardPolicy::AllButSelected => true,
        })
        .map(|s| s.index)
        .collect();

    for index in &muted {
        input.set_discard(*index, Discard::All);
    }

    tracing::debug!(
        "Selected {} stream {} ({} streams discarded)",
        media_type,
        selected,
        muted.len()
    );
}
