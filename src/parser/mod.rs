//! RSS item extraction.
//!
//! Reads a raw feed document with `quick-xml` and returns every `item`
//! element (at any depth, document order) as a map from direct child tag
//! name to that child's text. Well-formedness is checked as we go: a
//! mismatched or unclosed tag, a missing root, or content after the root
//! element is a parse error.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::debug;

use crate::constants::CURATED_COLUMNS;
use crate::error::{PipelineError, Result};
use crate::types::{CuratedRecord, FeedItem, ProjectionGap};

const ITEM_TAG: &str = "item";

struct OpenItem {
    /// Element stack height once the `item` tag itself is pushed.
    depth: usize,
    slot: usize,
    fields: FeedItem,
    child_text: Option<String>,
    /// Set once the open child has a sub-element; only text before it counts.
    text_closed: bool,
}

/// Parse every `item` element out of a raw feed document.
pub fn parse_feed_items(xml: &[u8]) -> Result<Vec<FeedItem>> {
    let xml = xml.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml);
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut open_items: Vec<OpenItem> = Vec::new();
    let mut slots: Vec<Option<FeedItem>> = Vec::new();
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                enter_root(&stack, &mut saw_root, &name)?;
                stack.push(name.clone());
                if let Some(item) = open_items.last_mut() {
                    if stack.len() == item.depth + 1 {
                        item.child_text = Some(String::new());
                        item.text_closed = false;
                    } else if stack.len() == item.depth + 2 {
                        item.text_closed = true;
                    }
                }
                if name == ITEM_TAG {
                    open_items.push(OpenItem {
                        depth: stack.len(),
                        slot: slots.len(),
                        fields: FeedItem::new(),
                        child_text: None,
                        text_closed: false,
                    });
                    slots.push(None);
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let height = stack.len();
                match stack.pop() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(PipelineError::Parse(format!(
                            "mismatched tag at byte {}: expected </{}>, found </{}>",
                            reader.buffer_position(),
                            open,
                            name
                        )))
                    }
                    None => {
                        return Err(PipelineError::Parse(format!(
                            "unexpected </{}> at byte {}",
                            name,
                            reader.buffer_position()
                        )))
                    }
                }
                if open_items.last().map(|i| i.depth) == Some(height) {
                    if let Some(done) = open_items.pop() {
                        slots[done.slot] = Some(done.fields);
                    }
                }
                if let Some(item) = open_items.last_mut() {
                    if height == item.depth + 1 {
                        let text = item.child_text.take().filter(|t| !t.is_empty());
                        item.fields.insert(name, text);
                    }
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                enter_root(&stack, &mut saw_root, &name)?;
                if name == ITEM_TAG {
                    slots.push(Some(FeedItem::new()));
                }
                if let Some(item) = open_items.last_mut() {
                    if stack.len() == item.depth {
                        item.fields.insert(name, None);
                    } else if stack.len() == item.depth + 1 {
                        item.text_closed = true;
                    }
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| parse_error(&reader, err))?;
                if stack.is_empty() {
                    if !text.trim().is_empty() {
                        return Err(PipelineError::Parse(format!(
                            "text outside the root element at byte {}",
                            reader.buffer_position()
                        )));
                    }
                } else {
                    push_child_text(&mut open_items, stack.len(), &text);
                }
            }
            Event::CData(e) => {
                if stack.is_empty() {
                    return Err(PipelineError::Parse(
                        "CDATA outside the root element".to_string(),
                    ));
                }
                let bytes = e.into_inner();
                push_child_text(&mut open_items, stack.len(), &String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(PipelineError::Parse(format!(
            "unexpected end of document: <{}> is not closed",
            open
        )));
    }
    if !saw_root {
        return Err(PipelineError::Parse("document has no root element".to_string()));
    }

    let items: Vec<FeedItem> = slots.into_iter().flatten().collect();
    debug!(items = items.len(), "parsed feed items");
    Ok(items)
}

fn enter_root(stack: &[String], saw_root: &mut bool, name: &str) -> Result<()> {
    if stack.is_empty() {
        if *saw_root {
            return Err(PipelineError::Parse(format!(
                "second root element <{}> after the document element",
                name
            )));
        }
        *saw_root = true;
    }
    Ok(())
}

fn push_child_text(open_items: &mut [OpenItem], height: usize, text: &str) {
    if let Some(item) = open_items.last_mut() {
        if height == item.depth + 1 && !item.text_closed {
            if let Some(buf) = item.child_text.as_mut() {
                buf.push_str(text);
            }
        }
    }
}

fn parse_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> PipelineError {
    PipelineError::Parse(format!(
        "malformed XML at byte {}: {}",
        reader.buffer_position(),
        err
    ))
}

/// Project a feed item onto the five curated columns.
///
/// Missing or empty children become `None` and are reported in `gaps`;
/// every other child is discarded.
pub fn project_item(item: &FeedItem, item_index: usize, gaps: &mut Vec<ProjectionGap>) -> CuratedRecord {
    let mut take = |field: &'static str| -> Option<String> {
        let value = item.get(field).cloned().flatten();
        if value.is_none() {
            gaps.push(ProjectionGap { item_index, field });
        }
        value
    };
    let [title, description, link, pub_date, guid] = CURATED_COLUMNS;
    CuratedRecord {
        title: take(title),
        description: take(description),
        link: take(link),
        pub_date: take(pub_date),
        guid: take(guid),
    }
}

/// Parse and project in one pass; rows keep document order.
pub fn curate_feed(xml: &[u8]) -> Result<(Vec<CuratedRecord>, Vec<ProjectionGap>)> {
    let items = parse_feed_items(xml)?;
    let mut gaps = Vec::new();
    let rows = items
        .iter()
        .enumerate()
        .map(|(index, item)| project_item(item, index, &mut gaps))
        .collect();
    Ok((rows, gaps))
}
