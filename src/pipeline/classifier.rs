// Stream classifier - picks best video and companion audio streams
//
// Pure function over the platform's representation list; performs no I/O.
// Platforms that split streams (Facebook-style DASH manifests) list the
// audio track as a representation with height 0 and an mp4a codec tag.

use super::models::{MergePlan, StreamRepresentation};

/// Codec signature that marks a zero-height representation as audio
const AUDIO_CODEC_TAG: &str = "mp4a";

/// Partition representations into video/audio candidates and decide whether
/// the post's video needs a merge step.
///
/// Video tie-break favors resolution over bitrate: greatest height wins,
/// bandwidth only breaks height ties. Platforms in scope emit at most one
/// audio track, so the first audio candidate encountered is used.
pub fn classify(representations: &[StreamRepresentation]) -> MergePlan {
    let mut best_video: Option<&StreamRepresentation> = None;
    let mut audio: Option<&StreamRepresentation> = None;

    for rep in representations {
        if rep.height > 0 {
            let better = match best_video {
                Some(current) => {
                    (rep.height, rep.bandwidth) > (current.height, current.bandwidth)
                }
                None => true,
            };
            if better {
                best_video = Some(rep);
            }
        } else if rep.codecs.contains(AUDIO_CODEC_TAG) {
            if audio.is_none() {
                audio = Some(rep);
            }
        }
        // Anything else (height 0, non-audio codec) is ignored
    }

    let needs_merge = best_video.is_some() && audio.is_some();

    MergePlan {
        video: best_video.cloned(),
        audio: audio.cloned(),
        needs_merge,
    }
}
