//! Binary diff/patch: computes and applies an [`Instruction`] stream describing how to
//! transform a source byte range into a target byte range.
//!
//! The diff pass splits both ranges into aligned 4096-byte windows, finds the
//! best-scoring run of matching 8-byte words inside each window pair (in parallel, via
//! [`crate::threader::Threader`]), and emits `Copy`/`Insert` instructions to cover the
//! gaps. A second pass promotes long single-byte `Insert` runs into `Repeat`
//! instructions. The result is LZ4-compressed and wrapped in a differential header.

use crate::buffer::Buffer;
use crate::compress;
use crate::error::RangeError;
use crate::memory_range::{ByteRange, MemoryRange};
use crate::threader::Threader;
use std::sync::{Arc, Mutex};

const TITLE: &str = "yatta diff";
const TITLE_WIDTH: usize = 16;
const HEADER_SIZE: usize = TITLE_WIDTH + 8;
const WINDOW_SIZE: usize = 4096;
const MIN_MATCH_WORDS: u64 = 4;
const REPEAT_PROMOTION_THRESHOLD: usize = 36;

/// One step of a patch program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `end_read - begin_read` bytes from the source at `begin_read` into the
    /// target at `index`.
    Copy {
        index: u64,
        begin_read: u64,
        end_read: u64,
    },
    /// Write `data` into the target at `index`.
    Insert { index: u64, data: Vec<u8> },
    /// Write `count` copies of `value` into the target starting at `index`.
    Repeat { index: u64, count: u64, value: u8 },
}

impl Instruction {
    fn wire_size(&self) -> usize {
        match self {
            Instruction::Copy { .. } => 1 + 8 + 8 + 8,
            Instruction::Insert { data, .. } => 1 + 8 + 8 + data.len(),
            Instruction::Repeat { .. } => 1 + 8 + 8 + 1,
        }
    }

    fn write(&self, buffer: &mut Buffer, offset: &mut usize) -> Result<(), RangeError> {
        match self {
            Instruction::Copy {
                index,
                begin_read,
                end_read,
            } => {
                buffer.write_u8(*offset, b'C')?;
                buffer.write_u64(*offset + 1, *index)?;
                buffer.write_u64(*offset + 9, *begin_read)?;
                buffer.write_u64(*offset + 17, *end_read)?;
                *offset += 25;
            }
            Instruction::Insert { index, data } => {
                buffer.write_u8(*offset, b'I')?;
                buffer.write_u64(*offset + 1, *index)?;
                buffer.write_u64(*offset + 9, data.len() as u64)?;
                if !data.is_empty() {
                    buffer.write_raw(*offset + 17, data)?;
                }
                *offset += 17 + data.len();
            }
            Instruction::Repeat {
                index,
                count,
                value,
            } => {
                buffer.write_u8(*offset, b'R')?;
                buffer.write_u64(*offset + 1, *index)?;
                buffer.write_u64(*offset + 9, *count)?;
                buffer.write_u8(*offset + 17, *value)?;
                *offset += 18;
            }
        }
        Ok(())
    }

    /// Read one instruction starting at `offset`. Returns `None` when `offset` points at
    /// an unrecognized tag byte, which terminates the instruction stream.
    fn read(range: &dyn ByteRange, offset: &mut usize) -> Option<Instruction> {
        let tag = range.read_u8(*offset).ok()?;
        match tag {
            b'C' => {
                let index = range.read_u64(*offset + 1).ok()?;
                let begin_read = range.read_u64(*offset + 9).ok()?;
                let end_read = range.read_u64(*offset + 17).ok()?;
                *offset += 25;
                Some(Instruction::Copy {
                    index,
                    begin_read,
                    end_read,
                })
            }
            b'I' => {
                let index = range.read_u64(*offset + 1).ok()?;
                let len = range.read_u64(*offset + 9).ok()? as usize;
                let data = range.read_bytes(*offset + 17, len).ok()?;
                *offset += 17 + len;
                Some(Instruction::Insert { index, data })
            }
            b'R' => {
                let index = range.read_u64(*offset + 1).ok()?;
                let count = range.read_u64(*offset + 9).ok()?;
                let value = range.read_u8(*offset + 17).ok()?;
                *offset += 18;
                Some(Instruction::Repeat {
                    index,
                    count,
                    value,
                })
            }
            _ => None,
        }
    }

    fn execute(&self, target: &mut Buffer, source: &MemoryRange) -> Result<(), RangeError> {
        match self {
            Instruction::Copy {
                index,
                begin_read,
                end_read,
            } => {
                let sub = source.subrange(*begin_read as usize, (*end_read - *begin_read) as usize)?;
                target.write_raw(*index as usize, sub.as_bytes())
            }
            Instruction::Insert { index, data } => target.write_raw(*index as usize, data),
            Instruction::Repeat {
                index,
                count,
                value,
            } => {
                let start = *index as usize;
                let end = std::cmp::min(start + *count as usize, target.size());
                for i in start..end {
                    target.write_u8(i, *value)?;
                }
                Ok(())
            }
        }
    }
}

/// A run of matching 8-byte words, offsets relative to the pair of ranges being compared.
#[derive(Debug, Clone, Copy)]
struct MatchInfo {
    length: u64,
    start_source: u64,
    start_target: u64,
}

/// Find the single best-scoring alignment between `source` and `target`: the starting
/// word offset into `source` whose word-by-word comparison against `target` yields the
/// highest total count of matched words, broken into runs of at least
/// [`MIN_MATCH_WORDS`]. Ties keep the first (lowest-offset) candidate.
fn find_matching_regions(source: &[u8], target: &[u8]) -> Vec<MatchInfo> {
    let mut best_matches: Vec<MatchInfo> = Vec::new();
    let mut best_score: u64 = 0;

    let word_count = source.len() / 8;
    for word_index in 0..word_count {
        let byte_index = word_index * 8;
        let sub_source = &source[byte_index..];
        let length = std::cmp::min(sub_source.len(), target.len());

        let mut run_words: u64 = 0;
        let mut score: u64 = 0;
        let mut matches: Vec<MatchInfo> = Vec::new();
        let mut ind = 0usize;
        while ind + 8 <= length {
            let a_word = u64::from_le_bytes(sub_source[ind..ind + 8].try_into().unwrap());
            let b_word = u64::from_le_bytes(target[ind..ind + 8].try_into().unwrap());
            if a_word == b_word {
                run_words += 1;
            } else {
                if run_words >= MIN_MATCH_WORDS {
                    let run_len = run_words * 8;
                    matches.push(MatchInfo {
                        length: run_len,
                        start_source: (byte_index as u64 + ind as u64) - run_len,
                        start_target: ind as u64 - run_len,
                    });
                    score += run_words;
                }
                run_words = 0;
            }
            ind += 8;
        }
        if run_words >= MIN_MATCH_WORDS {
            let run_len = run_words * 8;
            matches.push(MatchInfo {
                length: run_len,
                start_source: (byte_index as u64 + ind as u64) - run_len,
                start_target: ind as u64 - run_len,
            });
            score += run_words;
        }

        if score > best_score {
            best_score = score;
            best_matches = matches;
        }
    }
    best_matches
}

struct WindowPlan {
    index_source: usize,
    index_target: usize,
    size: usize,
}

/// Split both ranges into aligned windows and find the best region match per window,
/// in parallel across a [`Threader`].
fn split_and_match_windows(source: &[u8], target: &[u8]) -> Vec<(WindowPlan, Vec<MatchInfo>)> {
    let mut plans = Vec::new();
    let mut index_source = 0;
    let mut index_target = 0;
    while index_source < source.len() && index_target < target.len() {
        let remaining_source = source.len() - index_source;
        let remaining_target = target.len() - index_target;
        let size = std::cmp::min(WINDOW_SIZE, std::cmp::min(remaining_source, remaining_target));
        plans.push(WindowPlan {
            index_source,
            index_target,
            size,
        });
        index_source += size;
        index_target += size;
    }

    let results: Arc<Mutex<Vec<Option<Vec<MatchInfo>>>>> =
        Arc::new(Mutex::new((0..plans.len()).map(|_| None).collect()));
    let threader = Threader::new();
    for (slot, plan) in plans.iter().enumerate() {
        let window_source = source[plan.index_source..plan.index_source + plan.size].to_vec();
        let window_target = target[plan.index_target..plan.index_target + plan.size].to_vec();
        let results = Arc::clone(&results);
        threader.add_job(move || {
            let matches = find_matching_regions(&window_source, &window_target);
            results.lock().expect("results lock poisoned")[slot] = Some(matches);
        });
    }
    threader.wait_until_finished();

    let results = Arc::try_unwrap(results)
        .expect("threader shut down, no other owners remain")
        .into_inner()
        .expect("results lock poisoned");
    plans
        .into_iter()
        .zip(results)
        .map(|(plan, matches)| (plan, matches.expect("every slot filled by a job")))
        .collect()
}

fn emit_window_instructions(
    target: &[u8],
    plan: &WindowPlan,
    matches: &[MatchInfo],
    out: &mut Vec<Instruction>,
) {
    let window_start = plan.index_target;
    let window_end = plan.index_target + plan.size;

    if matches.is_empty() {
        out.push(Instruction::Insert {
            index: window_start as u64,
            data: target[window_start..window_end].to_vec(),
        });
        return;
    }

    let mut last_match_end = window_start as u64;
    for m in matches {
        let match_start_target = window_start as u64 + m.start_target;
        let match_start_source = plan.index_source as u64 + m.start_source;
        if match_start_target > last_match_end {
            let gap_start = last_match_end as usize;
            let gap_end = match_start_target as usize;
            out.push(Instruction::Insert {
                index: last_match_end,
                data: target[gap_start..gap_end].to_vec(),
            });
        }
        out.push(Instruction::Copy {
            index: match_start_target,
            begin_read: match_start_source,
            end_read: match_start_source + m.length,
        });
        last_match_end = match_start_target + m.length;
    }

    if (window_end as u64) > last_match_end {
        let gap_start = last_match_end as usize;
        out.push(Instruction::Insert {
            index: last_match_end,
            data: target[gap_start..window_end].to_vec(),
        });
    }
}

/// Scan `data` for a run of a single repeated byte longer than
/// [`REPEAT_PROMOTION_THRESHOLD`], using the byte 36 positions ahead as a cheap
/// prefilter before confirming the run length.
fn find_promotable_run(data: &[u8]) -> Option<(usize, usize, u8)> {
    if data.len() <= REPEAT_PROMOTION_THRESHOLD + 1 {
        return None;
    }
    let max = data.len() - (REPEAT_PROMOTION_THRESHOLD + 1);
    let mut x = 0usize;
    while x < max {
        let value = data[x];
        if data[x + REPEAT_PROMOTION_THRESHOLD] != value {
            x += 1;
            continue;
        }
        let mut y = x + 1;
        while y < max && data[y] == value {
            y += 1;
        }
        if y - x > REPEAT_PROMOTION_THRESHOLD {
            return Some((x, y, value));
        }
        x = y;
    }
    None
}

/// Split an `Insert` into an optional prefix `Insert`, a `Repeat`, and a remaining tail,
/// repeating until no more promotable runs remain in the tail.
fn promote_insert(initial_index: u64, initial_data: Vec<u8>) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut index = initial_index;
    let mut data = initial_data;

    while let Some((x, y, value)) = find_promotable_run(&data) {
        if x > 0 {
            out.push(Instruction::Insert {
                index,
                data: data[..x].to_vec(),
            });
        }
        let length = (y - x) as u64;
        out.push(Instruction::Repeat {
            index: index + x as u64,
            count: length,
            value,
        });
        index += x as u64 + length;
        data = data[y..].to_vec();
    }

    if !data.is_empty() || out.is_empty() {
        out.push(Instruction::Insert { index, data });
    }
    out
}

fn promote_repeats(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let threader = Threader::new();
    let results: Arc<Mutex<Vec<Option<Vec<Instruction>>>>> =
        Arc::new(Mutex::new((0..instructions.len()).map(|_| None).collect()));

    for (slot, inst) in instructions.into_iter().enumerate() {
        let results = Arc::clone(&results);
        threader.add_job(move || {
            let promoted = match inst {
                Instruction::Insert { index, data } => promote_insert(index, data),
                other => vec![other],
            };
            results.lock().expect("results lock poisoned")[slot] = Some(promoted);
        });
    }
    threader.wait_until_finished();

    Arc::try_unwrap(results)
        .expect("threader shut down, no other owners remain")
        .into_inner()
        .expect("results lock poisoned")
        .into_iter()
        .flat_map(|group| group.expect("every slot filled by a job"))
        .collect()
}

/// Compute a compressed diff from `source` to `target`. Returns `None` if the resulting
/// buffer could not be compressed (e.g. `source` and `target` are both empty).
pub fn diff(source: &MemoryRange, target: &MemoryRange) -> Option<Buffer> {
    if source.empty() && target.empty() {
        return None;
    }

    let (mut raw, index_target) = {
        let windows = split_and_match_windows(source.as_bytes(), target.as_bytes());
        let mut raw = Vec::new();
        let mut index_target = 0;
        for (plan, matches) in &windows {
            emit_window_instructions(target.as_bytes(), plan, matches, &mut raw);
            index_target = plan.index_target + plan.size;
        }
        (raw, index_target)
    };

    if index_target < target.size() {
        raw.push(Instruction::Insert {
            index: index_target as u64,
            data: target.as_bytes()[index_target..].to_vec(),
        });
    }

    let instructions = promote_repeats(std::mem::take(&mut raw));

    let payload_size: usize = instructions.iter().map(Instruction::wire_size).sum();
    let mut payload = Buffer::new(payload_size);
    let mut offset = 0;
    for inst in &instructions {
        inst.write(&mut payload, &mut offset).ok()?;
    }

    let compressed_payload = if payload.empty() {
        Buffer::empty_buffer()
    } else {
        payload.compress()?
    };

    let mut out = Buffer::new(HEADER_SIZE + compressed_payload.size());
    out.write_title(0, TITLE, TITLE_WIDTH).ok()?;
    out.write_u64(TITLE_WIDTH, target.size() as u64).ok()?;
    out.write_raw(HEADER_SIZE, compressed_payload.bytes()).ok()?;
    tracing::debug!(
        instructions = instructions.len(),
        target_size = target.size(),
        "computed diff"
    );
    Some(out)
}

/// Apply a diff produced by [`diff`] to `source`, producing the reconstructed target.
/// Returns `None` if `diff_buffer`'s header doesn't match or decompression fails.
pub fn patch(source: &MemoryRange, diff_buffer: &MemoryRange) -> Option<Buffer> {
    if diff_buffer.size() < HEADER_SIZE {
        return None;
    }
    let title = diff_buffer.read_title(0, TITLE_WIDTH).ok()?;
    if title != TITLE {
        tracing::debug!("patch: header title mismatch");
        return None;
    }
    let target_size = diff_buffer.read_u64(TITLE_WIDTH).ok()? as usize;

    let mut target = Buffer::new(target_size);
    if target_size == 0 {
        return Some(target);
    }

    let compressed_payload = diff_buffer.subrange(HEADER_SIZE, diff_buffer.size() - HEADER_SIZE).ok()?;
    let payload = compress::decompress_range(&compressed_payload)?;
    let payload_range = payload.as_range();

    let mut offset = 0;
    while offset < payload_range.size() {
        match Instruction::read(&payload_range, &mut offset) {
            Some(inst) => {
                if inst.execute(&mut target, source).is_err() {
                    tracing::debug!("patch: instruction execution out of bounds");
                    return None;
                }
            }
            None => {
                tracing::debug!(offset, "patch: unrecognized instruction tag, stopping");
                break;
            }
        }
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(bytes: &[u8]) -> MemoryRange<'_> {
        MemoryRange::new(bytes)
    }

    #[test]
    fn identical_buffers_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(200);
        let source = range(&data);
        let target = range(&data);
        let d = diff(&source, &target).expect("diff");
        let patched = patch(&source, &d.as_range()).expect("patch");
        assert_eq!(patched.bytes(), data.as_slice());
    }

    #[test]
    fn appended_tail_round_trips() {
        let base = b"hello world, this is a repeated prefix that should match exactly. ".repeat(100);
        let mut extended = base.clone();
        extended.extend_from_slice(b"and then something brand new at the end");

        let source = range(&base);
        let target = range(&extended);
        let d = diff(&source, &target).expect("diff");
        let patched = patch(&source, &d.as_range()).expect("patch");
        assert_eq!(patched.bytes(), extended.as_slice());
    }

    #[test]
    fn completely_different_buffers_round_trip() {
        let source_data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let target_data = vec![9u8, 10, 11, 12, 13, 14, 15, 16];
        let source = range(&source_data);
        let target = range(&target_data);
        let d = diff(&source, &target).expect("diff");
        let patched = patch(&source, &d.as_range()).expect("patch");
        assert_eq!(patched.bytes(), target_data.as_slice());
    }

    #[test]
    fn long_repeat_run_promotes_and_round_trips() {
        let mut data = b"prefix bytes before the run-".to_vec();
        data.extend(std::iter::repeat(b'z').take(100));
        data.extend_from_slice(b"-suffix bytes after the run");

        let source_data = vec![0u8; 8];
        let source = range(&source_data);
        let target = range(&data);
        let d = diff(&source, &target).expect("diff");
        let patched = patch(&source, &d.as_range()).expect("patch");
        assert_eq!(patched.bytes(), data.as_slice());
    }

    #[test]
    fn patch_rejects_wrong_header() {
        let garbage = vec![0u8; 64];
        let source_data = vec![1u8, 2, 3];
        let source = range(&source_data);
        assert!(patch(&source, &range(&garbage)).is_none());
    }

    #[test]
    fn find_matching_regions_prefers_longer_run() {
        let source: Vec<u8> = (0..64u8).collect();
        let mut target = vec![0u8; 64];
        target[16..48].copy_from_slice(&source[16..48]);
        let matches = find_matching_regions(&source, &target);
        assert!(!matches.is_empty());
        assert_eq!(matches[0].length, 32);
    }
}
