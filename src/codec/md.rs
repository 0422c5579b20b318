use pulldown_cmark::{
    CowStr, Event as MdEvent, Options, Parser as MdParser, Tag as MdTag, TagEnd as MdTagEnd,
};
use std::{collections::VecDeque, ops::Range};

use crate::codec::{
    chars::{is_line_ending, Code},
    constructs::{scan, InlineNode, Scanned},
    tokenizer::ConstructSet,
};

pub use pulldown_cmark;

/// A markdown event, or a construct recognized inside a paragraph's inline content.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteEvent<'a> {
    Markdown(MdEvent<'a>),
    Construct(InlineNode),
}

/// A note event with its source byte range.
pub type NoteEventWithRange<'a> = (NoteEvent<'a>, Range<usize>);

/// Stands in for source bytes that must not be scanned: code, math, inline HTML and
/// backslash-escaped punctuation. It is neither a filename nor a tag character.
const BLANK: char = '\u{1a}';

pub fn notesync_md_options() -> Options {
    let mut md_options = Options::empty();
    // Wikilinks stay off: `[[...]]` belongs to the note and date link constructs. Metadata
    // blocks stay off because frontmatter is split before the markdown parse.
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_MATH);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options
}

/// Returns the CommonMark events of `source` with every construct spliced in.
pub fn events<'a>(
    source: &'a str,
) -> ConstructStream<'a, impl Iterator<Item = (MdEvent<'a>, Range<usize>)> + 'a> {
    events_with(source, ConstructSet::all())
}

/// Like [`events`], restricted to the `enabled` constructs.
pub fn events_with<'a>(
    source: &'a str,
    enabled: ConstructSet,
) -> ConstructStream<'a, impl Iterator<Item = (MdEvent<'a>, Range<usize>)> + 'a> {
    let parser = MdParser::new_ext(source, notesync_md_options()).into_offset_iter();
    ConstructStream::new(source, parser, enabled)
}

fn is_inline_tag(tag: &MdTag<'_>) -> bool {
    matches!(
        tag,
        MdTag::Emphasis
            | MdTag::Strong
            | MdTag::Strikethrough
            | MdTag::Link { .. }
            | MdTag::Image { .. }
    )
}

fn is_inline_tag_end(end: &MdTagEnd) -> bool {
    matches!(
        end,
        MdTagEnd::Emphasis
            | MdTagEnd::Strong
            | MdTagEnd::Strikethrough
            | MdTagEnd::Link
            | MdTagEnd::Image
    )
}

/// Events that make up the inline content of a block.
fn is_inline(event: &MdEvent<'_>) -> bool {
    match event {
        MdEvent::Text(_)
        | MdEvent::Code(_)
        | MdEvent::InlineMath(_)
        | MdEvent::DisplayMath(_)
        | MdEvent::InlineHtml(_)
        | MdEvent::FootnoteReference(_)
        | MdEvent::SoftBreak
        | MdEvent::HardBreak
        | MdEvent::TaskListMarker(_) => true,
        MdEvent::Start(tag) => is_inline_tag(tag),
        MdEvent::End(end) => is_inline_tag_end(end),
        _ => false,
    }
}

/// Inline events whose source is never part of a construct.
fn is_opaque(event: &MdEvent<'_>) -> bool {
    matches!(
        event,
        MdEvent::Code(_)
            | MdEvent::InlineMath(_)
            | MdEvent::DisplayMath(_)
            | MdEvent::InlineHtml(_)
            | MdEvent::FootnoteReference(_)
            | MdEvent::TaskListMarker(_)
    )
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn union(a: Range<usize>, b: Range<usize>) -> Range<usize> {
    a.start.min(b.start)..a.end.max(b.end)
}

/// A link, image or emphasis inside an inline run.
#[derive(Debug)]
struct Span {
    start_event: usize,
    end_event: usize,
    outer: Range<usize>,
    /// Source covered by the nested events; `None` for an empty span such as `[](x)`.
    inner: Option<Range<usize>>,
}

impl Span {
    /// Whether `offset` lies in the delimiters after the content, e.g. `](url)`.
    fn tail_holds(&self, offset: usize) -> bool {
        let tail_start = self.inner.as_ref().map_or(self.outer.start + 1, |inner| inner.end);
        tail_start <= offset && offset < self.outer.end
    }

    /// Whether a construct at `range` sits entirely inside the content.
    fn contains(&self, range: &Range<usize>) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.start <= range.start && range.end <= inner.end)
    }
}

fn spans(run: &[(MdEvent<'_>, Range<usize>)]) -> Vec<Span> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    for (index, (event, _)) in run.iter().enumerate() {
        match event {
            MdEvent::Start(_) => open.push(index),
            MdEvent::End(_) => {
                if let Some(start_event) = open.pop() {
                    spans.push(Span {
                        start_event,
                        end_event: index,
                        outer: run[start_event].1.clone(),
                        inner: run[start_event + 1..index]
                            .iter()
                            .map(|(_, range)| range.clone())
                            .reduce(union),
                    });
                }
            }
            _ => {}
        }
    }
    spans
}

/// Copy of `source[extent]` with the `masked` ranges and backslash-escaped punctuation blanked
/// out. Byte offsets are preserved.
fn scan_buffer(source: &str, extent: Range<usize>, masked: &[Range<usize>]) -> String {
    let mut buffer = String::with_capacity(extent.len());
    let mut escaping = false;
    for (offset, c) in source.get(extent.clone()).unwrap_or_default().char_indices() {
        let at = extent.start + offset;
        let blank = if masked.iter().any(|range| range.contains(&at)) {
            escaping = false;
            true
        } else if escaping && c.is_ascii_punctuation() {
            escaping = false;
            true
        } else {
            escaping = c == '\\';
            false
        };
        if blank {
            buffer.extend(std::iter::repeat(BLANK).take(c.len_utf8()));
        } else {
            buffer.push(c);
        }
    }
    buffer
}

/// An inline run after construct placement.
enum Piece<'a> {
    Markup(MdEvent<'a>, Range<usize>),
    /// A text event, or with `None` the raw source of delimiters a construct cut through.
    Text(Option<CowStr<'a>>, Range<usize>),
}

/// Collects the output of one run, joining adjacent literal text.
struct RunWriter<'a> {
    out: Vec<NoteEventWithRange<'a>>,
    pending: Option<(CowStr<'a>, Range<usize>)>,
}

impl<'a> RunWriter<'a> {
    fn literal(&mut self, text: CowStr<'a>, range: Range<usize>) {
        if text.is_empty() {
            return;
        }
        self.pending = Some(match self.pending.take() {
            Some((previous, previous_range)) => {
                let mut joined = previous.into_string();
                joined.push_str(&text);
                (CowStr::from(joined), previous_range.start..range.end)
            }
            None => (text, range),
        });
    }

    fn event(&mut self, event: NoteEvent<'a>, range: Range<usize>) {
        self.flush();
        self.out.push((event, range));
    }

    fn flush(&mut self) {
        if let Some((text, range)) = self.pending.take() {
            self.out.push((NoteEvent::Markdown(MdEvent::Text(text)), range));
        }
    }
}

/// Wraps a pulldown-cmark offset iterator and splits the inline content of each block into
/// markdown events and [`NoteEvent::Construct`]s.
///
/// Constructs are found in the raw source of a run of inline events rather than in text
/// events, since CommonMark breaks text at every bracket and reads `[[1]](x)` or `[[1]]` next
/// to a `[1]:` definition as links. A link, image or emphasis a construct cuts through is
/// replaced by the raw text of its delimiters. Code, math and HTML are never scanned, and
/// neither is the text of code blocks, metadata blocks or HTML blocks.
pub struct ConstructStream<'a, I>
where
    I: Iterator<Item = (MdEvent<'a>, Range<usize>)>,
{
    source: &'a str,
    inner: std::iter::Peekable<I>,
    enabled: ConstructSet,
    verbatim_depth: usize,
    queue: VecDeque<NoteEventWithRange<'a>>,
}

impl<'a, I> ConstructStream<'a, I>
where
    I: Iterator<Item = (MdEvent<'a>, Range<usize>)>,
{
    pub fn new(source: &'a str, inner: I, enabled: ConstructSet) -> Self {
        ConstructStream {
            source,
            inner: inner.peekable(),
            enabled,
            verbatim_depth: 0,
            queue: VecDeque::new(),
        }
    }

    /// The source character before `offset`, with line endings reported as a line start.
    fn previous_code(&self, offset: usize) -> Code {
        let previous = self.source.get(..offset)?.chars().next_back();
        if is_line_ending(previous) {
            None
        } else {
            previous
        }
    }

    /// Source text, escapes included. Text pieces a construct splits are written this way since
    /// unescaped text has no byte mapping onto the source.
    fn raw(&self, range: Range<usize>) -> CowStr<'a> {
        CowStr::Borrowed(self.source.get(range).unwrap_or_default())
    }

    fn collect_run(
        &mut self,
        first: (MdEvent<'a>, Range<usize>),
    ) -> Vec<(MdEvent<'a>, Range<usize>)> {
        let mut run = vec![first];
        while let Some((event, _)) = self.inner.peek() {
            if !is_inline(event) {
                break;
            }
            if let Some(next) = self.inner.next() {
                run.push(next);
            }
        }
        run
    }

    /// Constructs in the raw source of `run`, with absolute ranges.
    fn find_constructs(
        &self,
        run: &[(MdEvent<'a>, Range<usize>)],
        spans: &[Span],
    ) -> Vec<(Range<usize>, InlineNode)> {
        let Some(extent) = run.iter().map(|(_, range)| range.clone()).reduce(union) else {
            return Vec::new();
        };
        let masked: Vec<Range<usize>> = run
            .iter()
            .filter(|(event, _)| is_opaque(event))
            .map(|(_, range)| range.clone())
            .collect();
        let barriers: Vec<Range<usize>> = run
            .iter()
            .filter(|(event, _)| {
                is_opaque(event) || matches!(event, MdEvent::SoftBreak | MdEvent::HardBreak)
            })
            .map(|(_, range)| range.clone())
            .collect();
        let raw = self.source.get(extent.clone()).unwrap_or_default();
        let buffer = scan_buffer(self.source, extent.clone(), &masked);
        scan(&buffer, self.previous_code(extent.start), self.enabled)
            .into_iter()
            .filter_map(|piece| match piece {
                Scanned::Construct { token, node } => {
                    // Labels keep their escapes as written.
                    let node = InlineNode::from_token(&token, raw).unwrap_or(node);
                    let range = extent.start + token.range.start..extent.start + token.range.end;
                    Some((range, node))
                }
                Scanned::Literal(_) => None,
            })
            .filter(|(range, _)| {
                !barriers.iter().any(|barrier| overlaps(barrier, range))
                    && !spans.iter().any(|span| span.tail_holds(range.start))
            })
            .collect()
    }

    /// Lays out `run` as pieces, breaking every span a construct cuts through.
    fn pieces(
        run: Vec<(MdEvent<'a>, Range<usize>)>,
        spans: &[Span],
        constructs: &[(Range<usize>, InlineNode)],
    ) -> Vec<Piece<'a>> {
        let mut heads = vec![None; run.len()];
        let mut tails = vec![None; run.len()];
        for span in spans {
            let broken = constructs
                .iter()
                .any(|(range, _)| overlaps(range, &span.outer) && !span.contains(range));
            if !broken {
                continue;
            }
            match &span.inner {
                Some(inner) => {
                    heads[span.start_event] = Some(span.outer.start..inner.start);
                    tails[span.end_event] = Some(inner.end..span.outer.end);
                }
                None => {
                    heads[span.start_event] = Some(span.outer.clone());
                    tails[span.end_event] = Some(span.outer.end..span.outer.end);
                }
            }
        }
        let mut pieces = Vec::with_capacity(run.len());
        for (index, (event, range)) in run.into_iter().enumerate() {
            if let Some(raw) = heads[index].take().or_else(|| tails[index].take()) {
                if !raw.is_empty() {
                    pieces.push(Piece::Text(None, raw));
                }
                continue;
            }
            match event {
                MdEvent::Text(text) => pieces.push(Piece::Text(Some(text), range)),
                event => pieces.push(Piece::Markup(event, range)),
            }
        }
        pieces
    }

    fn split_run(&mut self, run: Vec<(MdEvent<'a>, Range<usize>)>) {
        let spans = spans(&run);
        let mut constructs = self.find_constructs(&run, &spans);
        let pieces = Self::pieces(run, &spans, &constructs);
        // A construct is emitted where its first byte is text.
        constructs.retain(|(range, _)| {
            pieces.iter().any(|piece| {
                matches!(piece, Piece::Text(_, text_range) if text_range.contains(&range.start))
            })
        });

        let mut writer = RunWriter {
            out: Vec::new(),
            pending: None,
        };
        let mut constructs = constructs.into_iter().peekable();
        let mut current: Option<Range<usize>> = None;
        for piece in pieces {
            let (mut text, range) = match piece {
                Piece::Markup(event, range) => {
                    writer.event(NoteEvent::Markdown(event), range);
                    continue;
                }
                Piece::Text(text, range) => (text, range),
            };
            let mut at = range.start;
            let mut untouched = true;
            while at < range.end {
                if let Some(covering) = current.clone().filter(|covering| covering.start <= at) {
                    at = covering.end.min(range.end);
                    untouched = false;
                    if covering.end <= range.end {
                        current = None;
                    }
                    continue;
                }
                match constructs.next_if(|(next, _)| next.start < range.end) {
                    Some((construct_range, node)) => {
                        if at < construct_range.start {
                            let literal = self.raw(at..construct_range.start);
                            writer.literal(literal, at..construct_range.start);
                        }
                        at = construct_range.start;
                        writer.event(NoteEvent::Construct(node), construct_range.clone());
                        current = Some(construct_range);
                    }
                    None if untouched => {
                        let literal = text.take().unwrap_or_else(|| self.raw(range.clone()));
                        writer.literal(literal, range.clone());
                        break;
                    }
                    None => {
                        let literal = self.raw(at..range.end);
                        writer.literal(literal, at..range.end);
                        break;
                    }
                }
            }
        }
        writer.flush();
        self.queue.extend(writer.out);
    }

    fn track_verbatim(&mut self, event: &MdEvent<'a>) {
        match event {
            MdEvent::Start(MdTag::CodeBlock(_) | MdTag::HtmlBlock | MdTag::MetadataBlock(_)) => {
                self.verbatim_depth += 1
            }
            MdEvent::End(MdTagEnd::CodeBlock | MdTagEnd::HtmlBlock | MdTagEnd::MetadataBlock(_)) => {
                self.verbatim_depth = self.verbatim_depth.saturating_sub(1)
            }
            _ => {}
        }
    }
}

impl<'a, I> Iterator for ConstructStream<'a, I>
where
    I: Iterator<Item = (MdEvent<'a>, Range<usize>)>,
{
    type Item = NoteEventWithRange<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(queued) = self.queue.pop_front() {
            return Some(queued);
        }
        let (event, range) = self.inner.next()?;
        self.track_verbatim(&event);
        if self.verbatim_depth == 0 && !self.enabled.is_empty() && is_inline(&event) {
            let run = self.collect_run((event, range));
            self.split_run(run);
            return self.queue.pop_front();
        }
        Some((NoteEvent::Markdown(event), range))
    }
}
