//! Structural parser for GUX spec text.
//!
//! The text is read as nested `Name(args)` calls. Only the structural
//! vocabulary (`Page`, `Zone`, `Style`, `Bounds`, `Viewport`, `Assert`,
//! `Dynamic`) is validated; every other call becomes an opaque widget node.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use super::lexer::{check_balanced, tokenize, Token, TokenKind};
use super::model::{
    Assertions, Bounds, ColourToken, Node, PageSpec, SpecTree, StyleMap, StyleValue, Viewport,
    WidgetNode, ZoneSpec, COLOUR_PROPERTIES,
};
use crate::error::{Location, ParseError, ParseErrorKind};
use crate::palette;

const STRUCTURAL: [&str; 7] = [
    "Page", "Zone", "Style", "Bounds", "Viewport", "Assert", "Dynamic",
];

/// Namespace prefix for dotted palette references (`tw.slate50`).
const PALETTE_NAMESPACE: &str = "tw";

/// Constructor keywords that may precede a call (`const Zone(...)`).
const CALL_PREFIXES: [&str; 2] = ["const", "new"];

/// Parse spec text into a [`SpecTree`].
pub fn parse(source: &str) -> Result<SpecTree, ParseError> {
    let tokens = tokenize(source)?;
    check_balanced(source, &tokens)?;

    let Some(page_idx) = find_page(&tokens, 0) else {
        return Err(ParseError::new(
            ParseErrorKind::MissingPage,
            "no top-level Page(...) declaration",
            Location::at(source, 0),
        ));
    };

    let mut cursor = Cursor {
        source,
        tokens: &tokens,
        pos: page_idx,
    };
    let doc = docs_before(&tokens, page_idx);
    let call = cursor.parse_call(doc)?;

    if let Some(extra) = find_page(&tokens, cursor.pos) {
        return Err(ParseError::new(
            ParseErrorKind::InvalidArguments,
            "a document declares exactly one Page(...)",
            Location::at(source, tokens[extra].start),
        ));
    }

    let page = Lowerer { source }.lower_page(call)?;
    let digest = hex::encode(Sha256::digest(source.as_bytes()));

    tracing::debug!(
        page = %page.name,
        children = page.children.len(),
        digest = %digest,
        "spec parsed"
    );

    Ok(SpecTree { page, digest })
}

fn find_page(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| {
        matches!(&tokens[i].kind, TokenKind::Ident(n) if n == "Page")
            && matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::Open('(')))
    })
}

fn docs_before(tokens: &[Token], idx: usize) -> Option<String> {
    let mut lines = Vec::new();
    for token in tokens[..idx].iter().rev() {
        match &token.kind {
            TokenKind::Doc(text) => lines.push(text.clone()),
            _ => break,
        }
    }
    lines.reverse();
    join_doc(lines)
}

fn join_doc(lines: Vec<String>) -> Option<String> {
    (!lines.is_empty()).then(|| lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Raw call tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RawCall {
    name: String,
    args: Vec<RawArg>,
    start: usize,
    end: usize,
    doc: Option<String>,
}

#[derive(Debug, Clone)]
struct RawArg {
    key: Option<String>,
    key_start: usize,
    value: RawValue,
}

#[derive(Debug, Clone)]
struct RawValue {
    kind: ValueKind,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
enum ValueKind {
    Str(String),
    Number(String),
    Bool(bool),
    Path(Vec<String>),
    Call(RawCall),
    List(Vec<RawValue>),
    /// Anything else, kept as its source span. Holds the calls found
    /// inside the run so zones in it are not lost.
    Raw(Vec<RawValue>),
}

struct Cursor<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a TokenKind> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |t| t.start)
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.end)
    }

    fn eof(&self) -> ParseError {
        ParseError::new(
            ParseErrorKind::UnbalancedDelimiters,
            "unexpected end of input",
            Location::at(self.source, self.source.len()),
        )
    }

    fn take_docs(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        while let Some(TokenKind::Doc(text)) = self.peek() {
            lines.push(text.clone());
            self.pos += 1;
        }
        join_doc(lines)
    }

    fn at_separator(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(TokenKind::Comma) | Some(TokenKind::Close(_))
        )
    }

    /// Expects `Ident (` at the cursor.
    fn parse_call(&mut self, doc: Option<String>) -> Result<RawCall, ParseError> {
        let name_token = self.bump().ok_or_else(|| self.eof())?;
        let name = match &name_token.kind {
            TokenKind::Ident(name) => name.clone(),
            _ => String::new(),
        };
        self.bump();
        let args = self.parse_args()?;
        Ok(RawCall {
            name,
            args,
            start: name_token.start,
            end: self.prev_end(),
            doc,
        })
    }

    fn parse_args(&mut self) -> Result<Vec<RawArg>, ParseError> {
        let mut args = Vec::new();
        loop {
            let doc = self.take_docs();
            match self.peek() {
                None => return Err(self.eof()),
                Some(TokenKind::Close(_)) => {
                    self.bump();
                    return Ok(args);
                }
                Some(TokenKind::Comma) => {
                    self.bump();
                    continue;
                }
                _ => {}
            }

            let key_start = self.offset();
            let key = match (self.peek(), self.peek_at(1)) {
                (Some(TokenKind::Ident(k)), Some(TokenKind::Colon)) => {
                    self.pos += 2;
                    Some(k.clone())
                }
                _ => None,
            };
            let value = self.parse_value(doc)?;
            args.push(RawArg {
                key,
                key_start,
                value,
            });
        }
    }

    fn parse_value(&mut self, doc: Option<String>) -> Result<RawValue, ParseError> {
        let doc = self.take_docs().or(doc);
        if let (Some(TokenKind::Ident(prefix)), Some(TokenKind::Ident(_)), Some(TokenKind::Open('('))) =
            (self.peek(), self.peek_at(1), self.peek_at(2))
        {
            if CALL_PREFIXES.contains(&prefix.as_str()) {
                self.pos += 1;
            }
        }
        let start = self.offset();
        let mut kind = match self.peek() {
            None => return Err(self.eof()),
            Some(TokenKind::Str(s)) => {
                self.bump();
                ValueKind::Str(s.clone())
            }
            Some(TokenKind::Number(n)) => {
                self.bump();
                ValueKind::Number(n.clone())
            }
            Some(TokenKind::Ident(name)) => {
                if matches!(self.peek_at(1), Some(TokenKind::Open('('))) {
                    ValueKind::Call(self.parse_call(doc)?)
                } else if name == "true" || name == "false" {
                    self.bump();
                    ValueKind::Bool(name == "true")
                } else {
                    self.bump();
                    let mut segments = vec![name.clone()];
                    while let (Some(TokenKind::Dot), Some(TokenKind::Ident(next))) =
                        (self.peek(), self.peek_at(1))
                    {
                        segments.push(next.clone());
                        self.pos += 2;
                    }
                    ValueKind::Path(segments)
                }
            }
            Some(TokenKind::Open('[')) => {
                self.bump();
                ValueKind::List(self.parse_list()?)
            }
            Some(_) => ValueKind::Raw(self.skip_raw()?),
        };

        if !self.at_separator() {
            let mut inner = match kind {
                ValueKind::Raw(inner) => inner,
                leading => vec![RawValue {
                    kind: leading,
                    start,
                    end: self.prev_end(),
                }],
            };
            inner.extend(self.skip_raw()?);
            kind = ValueKind::Raw(inner);
        }

        Ok(RawValue {
            kind,
            start,
            end: self.prev_end(),
        })
    }

    fn parse_list(&mut self) -> Result<Vec<RawValue>, ParseError> {
        let mut items = Vec::new();
        loop {
            let doc = self.take_docs();
            match self.peek() {
                None => return Err(self.eof()),
                Some(TokenKind::Close(_)) => {
                    self.bump();
                    return Ok(items);
                }
                Some(TokenKind::Comma) => {
                    self.bump();
                }
                _ => items.push(self.parse_value(doc)?),
            }
        }
    }

    /// Consume a balanced token run up to the next separator at this depth,
    /// returning every call met on the way.
    fn skip_raw(&mut self) -> Result<Vec<RawValue>, ParseError> {
        let mut calls = Vec::new();
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Comma | TokenKind::Close(_) if depth == 0 => break,
                TokenKind::Ident(_) if matches!(self.peek_at(1), Some(TokenKind::Open('('))) => {
                    let start = self.offset();
                    let call = self.parse_call(None)?;
                    calls.push(RawValue {
                        kind: ValueKind::Call(call),
                        start,
                        end: self.prev_end(),
                    });
                    continue;
                }
                TokenKind::Open(_) => depth += 1,
                TokenKind::Close(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }
        Ok(calls)
    }
}

// ---------------------------------------------------------------------------
// Lowering: raw calls -> typed tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Page,
    Zone,
}

#[derive(Default)]
struct Children {
    nodes: Vec<Node>,
    names: BTreeSet<String>,
}

#[derive(Default)]
struct Members {
    viewport: Option<Viewport>,
    style: Option<(StyleMap, BTreeSet<String>)>,
    bounds: Option<Bounds>,
    assertions: Option<Assertions>,
    children: Children,
}

struct Lowerer<'a> {
    source: &'a str,
}

impl<'a> Lowerer<'a> {
    fn err(&self, kind: ParseErrorKind, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::new(kind, message, Location::at(self.source, offset))
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.source.get(start..end).unwrap_or_default().to_string()
    }

    fn lower_page(&self, call: RawCall) -> Result<PageSpec, ParseError> {
        let (name, rest) = self.leading_name(call.args, "Page", call.start)?;
        let members = self.lower_members(Owner::Page, rest)?;
        Ok(PageSpec {
            name,
            doc: call.doc,
            viewport: members.viewport,
            style: members.style.map(|(s, _)| s).unwrap_or_default(),
            children: members.children.nodes,
        })
    }

    fn lower_zone(&self, call: RawCall) -> Result<ZoneSpec, ParseError> {
        let (name, rest) = self.leading_name(call.args, "Zone", call.start)?;
        if name.contains('/') {
            return Err(self.err(
                ParseErrorKind::InvalidArguments,
                format!("zone name `{name}` must not contain `/`"),
                call.start,
            ));
        }
        let members = self.lower_members(Owner::Zone, rest)?;
        let (style, dynamic) = members.style.unwrap_or_default();
        Ok(ZoneSpec {
            name,
            doc: call.doc,
            bounds: members.bounds,
            style,
            assertions: members.assertions,
            dynamic,
            children: members.children.nodes,
        })
    }

    fn leading_name(
        &self,
        args: Vec<RawArg>,
        construct: &str,
        at: usize,
    ) -> Result<(String, Vec<RawArg>), ParseError> {
        let mut args = args.into_iter();
        match args.next() {
            Some(RawArg {
                key: None,
                value:
                    RawValue {
                        kind: ValueKind::Str(name),
                        ..
                    },
                ..
            }) if !name.trim().is_empty() => Ok((name, args.collect())),
            _ => Err(self.err(
                ParseErrorKind::InvalidArguments,
                format!("{construct}(...) needs a quoted name as its first argument"),
                at,
            )),
        }
    }

    fn lower_members(&self, owner: Owner, args: Vec<RawArg>) -> Result<Members, ParseError> {
        let mut members = Members::default();
        for arg in args {
            let expected = arg.key.as_deref().and_then(key_construct);
            let RawValue { kind, start, end } = arg.value;
            match kind {
                ValueKind::Call(call) if is_structural(&call.name) => {
                    if let Some(expected) = expected {
                        if expected != call.name {
                            return Err(self.err(
                                ParseErrorKind::InvalidArguments,
                                format!(
                                    "`{}` expects {expected}(...), found {}(...)",
                                    arg.key.unwrap_or_default(),
                                    call.name
                                ),
                                arg.key_start,
                            ));
                        }
                    }
                    self.lower_construct(owner, call, &mut members)?;
                }
                other => {
                    if let Some(expected) = expected {
                        let kind = if expected == "Bounds" {
                            ParseErrorKind::InvalidBounds
                        } else {
                            ParseErrorKind::InvalidArguments
                        };
                        return Err(self.err(
                            kind,
                            format!(
                                "`{}` expects {expected}(...)",
                                arg.key.unwrap_or_default()
                            ),
                            start,
                        ));
                    }
                    let value = RawValue {
                        kind: other,
                        start,
                        end,
                    };
                    self.collect_children(value, &mut members.children)?;
                }
            }
        }
        Ok(members)
    }

    fn lower_construct(
        &self,
        owner: Owner,
        call: RawCall,
        members: &mut Members,
    ) -> Result<(), ParseError> {
        let at = call.start;
        match (call.name.as_str(), owner) {
            ("Zone", _) => {
                let zone = self.lower_zone(call)?;
                self.push_zone(&mut members.children, zone, at)
            }
            ("Style", _) => {
                if members.style.is_some() {
                    return Err(self.duplicate("Style", at));
                }
                members.style = Some(self.lower_style(call)?);
                Ok(())
            }
            ("Viewport", Owner::Page) => {
                if members.viewport.is_some() {
                    return Err(self.duplicate("Viewport", at));
                }
                members.viewport = Some(self.lower_viewport(call)?);
                Ok(())
            }
            ("Bounds", Owner::Zone) => {
                if members.bounds.is_some() {
                    return Err(self.err(
                        ParseErrorKind::InvalidBounds,
                        "Bounds(...) declared twice",
                        at,
                    ));
                }
                members.bounds = Some(self.lower_bounds(call)?);
                Ok(())
            }
            ("Assert", Owner::Zone) => {
                if members.assertions.is_some() {
                    return Err(self.duplicate("Assert", at));
                }
                members.assertions = Some(self.lower_assert(call)?);
                Ok(())
            }
            (name, _) => Err(self.err(
                ParseErrorKind::InvalidArguments,
                format!("{name}(...) is not allowed here"),
                at,
            )),
        }
    }

    fn duplicate(&self, construct: &str, at: usize) -> ParseError {
        self.err(
            ParseErrorKind::InvalidArguments,
            format!("{construct}(...) declared twice"),
            at,
        )
    }

    fn push_zone(
        &self,
        children: &mut Children,
        zone: ZoneSpec,
        at: usize,
    ) -> Result<(), ParseError> {
        if !children.names.insert(zone.name.clone()) {
            return Err(self.err(
                ParseErrorKind::DuplicateZone,
                format!("zone `{}` is declared twice in the same parent", zone.name),
                at,
            ));
        }
        children.nodes.push(Node::Zone(zone));
        Ok(())
    }

    /// Child position: zones and widgets, directly or inside lists.
    fn collect_children(&self, value: RawValue, children: &mut Children) -> Result<(), ParseError> {
        match value.kind {
            ValueKind::Call(call) if call.name == "Zone" => {
                let at = call.start;
                let zone = self.lower_zone(call)?;
                self.push_zone(children, zone, at)
            }
            ValueKind::Call(call) if is_structural(&call.name) => Err(self.err(
                ParseErrorKind::InvalidArguments,
                format!("{}(...) is not allowed inside a child list", call.name),
                call.start,
            )),
            ValueKind::Call(call) => {
                children.nodes.push(Node::Widget(WidgetNode {
                    name: call.name.clone(),
                    raw: self.text(call.start, call.end),
                    doc: call.doc.clone(),
                }));
                for arg in call.args {
                    self.hoist_zones(arg.value, children)?;
                }
                Ok(())
            }
            ValueKind::List(items) => {
                for item in items {
                    self.collect_children(item, children)?;
                }
                Ok(())
            }
            ValueKind::Raw(inner) => {
                for item in inner {
                    self.hoist_zones(item, children)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Widgets are opaque, but zones nested in their arguments still belong
    /// to the enclosing zone.
    fn hoist_zones(&self, value: RawValue, children: &mut Children) -> Result<(), ParseError> {
        match value.kind {
            ValueKind::Call(call) if call.name == "Zone" => {
                let at = call.start;
                let zone = self.lower_zone(call)?;
                self.push_zone(children, zone, at)
            }
            ValueKind::Call(call) => {
                for arg in call.args {
                    self.hoist_zones(arg.value, children)?;
                }
                Ok(())
            }
            ValueKind::List(items) | ValueKind::Raw(items) => {
                for item in items {
                    self.hoist_zones(item, children)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn lower_bounds(&self, call: RawCall) -> Result<Bounds, ParseError> {
        if call.args.len() != 4 {
            return Err(self.err(
                ParseErrorKind::InvalidBounds,
                format!(
                    "Bounds(...) takes four numbers x1, y1, x2, y2, found {} argument(s)",
                    call.args.len()
                ),
                call.start,
            ));
        }
        let mut coords = [0u32; 4];
        for (slot, arg) in coords.iter_mut().zip(&call.args) {
            *slot = match (&arg.key, &arg.value.kind) {
                (None, ValueKind::Number(text)) => text.parse::<u32>().map_err(|_| {
                    self.err(
                        ParseErrorKind::InvalidBounds,
                        format!("`{text}` is not a non-negative integer"),
                        arg.value.start,
                    )
                })?,
                _ => {
                    return Err(self.err(
                        ParseErrorKind::InvalidBounds,
                        format!(
                            "`{}` is not a numeric literal",
                            self.text(arg.key_start, arg.value.end)
                        ),
                        arg.key_start,
                    ))
                }
            };
        }
        let [x1, y1, x2, y2] = coords;
        if x1 >= x2 || y1 >= y2 {
            return Err(self.err(
                ParseErrorKind::InvalidBounds,
                format!("Bounds({x1}, {y1}, {x2}, {y2}) requires x1 < x2 and y1 < y2"),
                call.start,
            ));
        }
        Ok(Bounds::new(x1, y1, x2, y2))
    }

    fn lower_viewport(&self, call: RawCall) -> Result<Viewport, ParseError> {
        let dims: Vec<u32> = call
            .args
            .iter()
            .filter_map(|arg| match (&arg.key, &arg.value.kind) {
                (None, ValueKind::Number(text)) => text.parse::<u32>().ok().filter(|v| *v > 0),
                _ => None,
            })
            .collect();
        match (call.args.len(), dims.as_slice()) {
            (2, [width, height]) => Ok(Viewport {
                width: *width,
                height: *height,
            }),
            _ => Err(self.err(
                ParseErrorKind::InvalidArguments,
                "Viewport(...) takes two positive integers: width, height",
                call.start,
            )),
        }
    }

    fn lower_style(&self, call: RawCall) -> Result<(StyleMap, BTreeSet<String>), ParseError> {
        let mut style = StyleMap::new();
        let mut dynamic = BTreeSet::new();

        for arg in call.args {
            let Some(key) = arg.key else {
                return Err(self.err(
                    ParseErrorKind::InvalidArguments,
                    "Style(...) arguments must be `property: value` pairs",
                    arg.value.start,
                ));
            };
            let key = if key == "color" {
                "colour".to_string()
            } else {
                key
            };
            if style.contains_key(&key) {
                return Err(self.err(
                    ParseErrorKind::InvalidArguments,
                    format!("style property `{key}` declared twice"),
                    arg.key_start,
                ));
            }

            let is_colour = COLOUR_PROPERTIES.contains(&key.as_str());
            let RawValue { kind, start, end } = arg.value;
            let value = match kind {
                ValueKind::Call(inner) if inner.name == "Dynamic" => {
                    let name = self.dynamic_name(&inner)?;
                    dynamic.insert(key.clone());
                    StyleValue::Dynamic { name }
                }
                ValueKind::Call(inner) if is_structural(&inner.name) => {
                    return Err(self.err(
                        ParseErrorKind::InvalidArguments,
                        format!("{}(...) is not a style value", inner.name),
                        inner.start,
                    ));
                }
                ValueKind::Str(raw) if is_colour || raw.starts_with('#') => {
                    StyleValue::Colour(self.colour(raw, start)?)
                }
                ValueKind::Str(raw) => StyleValue::Literal { raw },
                ValueKind::Path(segments)
                    if is_colour || segments.first().map(String::as_str) == Some(PALETTE_NAMESPACE) =>
                {
                    StyleValue::Colour(self.colour(segments.join("."), start)?)
                }
                _ if is_colour => {
                    return Err(self.err(
                        ParseErrorKind::UnknownColour,
                        format!(
                            "`{}` is not a colour value for `{key}`",
                            self.text(start, end)
                        ),
                        start,
                    ));
                }
                _ => StyleValue::Literal {
                    raw: self.text(start, end),
                },
            };
            style.insert(key, value);
        }

        Ok((style, dynamic))
    }

    fn colour(&self, raw: String, at: usize) -> Result<ColourToken, ParseError> {
        match palette::resolve(&raw) {
            Ok(rgb) => Ok(ColourToken { raw, rgb }),
            Err(err) => Err(self.err(ParseErrorKind::UnknownColour, err.to_string(), at)),
        }
    }

    fn dynamic_name(&self, call: &RawCall) -> Result<String, ParseError> {
        match call.args.as_slice() {
            [RawArg {
                key: None,
                value:
                    RawValue {
                        kind: ValueKind::Str(name),
                        ..
                    },
                ..
            }] => Ok(name.clone()),
            _ => Err(self.err(
                ParseErrorKind::InvalidArguments,
                "Dynamic(...) takes a single quoted name",
                call.start,
            )),
        }
    }

    fn lower_assert(&self, call: RawCall) -> Result<Assertions, ParseError> {
        let mut assertions = Assertions::default();
        let mut seen = BTreeSet::new();

        for arg in call.args {
            let Some(key) = arg.key else {
                return Err(self.err(
                    ParseErrorKind::InvalidArguments,
                    "Assert(...) arguments must be `check: threshold` pairs",
                    arg.value.start,
                ));
            };
            if !seen.insert(key.clone()) {
                return Err(self.err(
                    ParseErrorKind::InvalidArguments,
                    format!("assertion `{key}` declared twice"),
                    arg.key_start,
                ));
            }
            let at = arg.value.start;
            let bad = |expected: &str| {
                self.err(
                    ParseErrorKind::InvalidArguments,
                    format!("assertion `{key}` expects {expected}"),
                    at,
                )
            };
            match (key.as_str(), &arg.value.kind) {
                ("min_transitions_v", ValueKind::Number(text)) => {
                    assertions.min_transitions_v =
                        Some(parse_threshold(text).ok_or_else(|| bad("a non-negative number"))?);
                }
                ("min_transitions_h", ValueKind::Number(text)) => {
                    assertions.min_transitions_h =
                        Some(parse_threshold(text).ok_or_else(|| bad("a non-negative number"))?);
                }
                ("min_regions", ValueKind::Number(text)) => {
                    assertions.min_regions = Some(
                        text.parse::<u32>()
                            .map_err(|_| bad("a non-negative integer"))?,
                    );
                }
                ("non_blank", ValueKind::Bool(flag)) => assertions.non_blank = *flag,
                ("min_transitions_v" | "min_transitions_h", _) => {
                    return Err(bad("a non-negative number"))
                }
                ("min_regions", _) => return Err(bad("a non-negative integer")),
                ("non_blank", _) => return Err(bad("true or false")),
                _ => {
                    return Err(self.err(
                        ParseErrorKind::InvalidArguments,
                        format!("unknown assertion `{key}`"),
                        arg.key_start,
                    ))
                }
            }
        }

        Ok(assertions)
    }
}

fn is_structural(name: &str) -> bool {
    STRUCTURAL.contains(&name)
}

fn key_construct(key: &str) -> Option<&'static str> {
    match key {
        "viewport" => Some("Viewport"),
        "style" => Some("Style"),
        "bounds" => Some("Bounds"),
        "assert" => Some("Assert"),
        _ => None,
    }
}

fn parse_threshold(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Rgb;

    const SAMPLE: &str = r##"
/// Chat page
Page('chat',
  viewport: Viewport(1280, 800),
  style: Style(bg: '#ffffff'),

  /// SIDEBAR: navigation column
  Zone('sidebar',
    bounds: Bounds(0, 0, 280, 800),
    style: Style(bg: '#f9fafb', text: tw.slate700, radius: 8),
    Zone('user-info',
      style: Style(text: Dynamic('username')),
      Avatar(size: 32, src: 'me.png'),
    ),
  ),
  Zone('main',
    bounds: Bounds(280, 0, 1280, 800),
    style: Style(bg: tw.white),
    children: [
      Zone('header', bounds: Bounds(280, 0, 1280, 52), style: Style(bg: "#1e293b")),
      Column(gap: 4, children: [
        Zone('messages', bounds: Bounds(280, 52, 1280, 740),
          assert: Assert(min_transitions_v: 10, min_transitions_h: 2.5, min_regions: 3, non_blank: true)),
      ]),
    ],
  ),
)
"##;

    fn zone<'a>(tree: &'a SpecTree, path: &str) -> &'a ZoneSpec {
        tree.zone(path).unwrap_or_else(|| panic!("zone {path} missing"))
    }

    #[test]
    fn test_page_and_viewport() {
        let tree = parse(SAMPLE).unwrap();
        assert_eq!(tree.page.name, "chat");
        assert_eq!(tree.page.doc.as_deref(), Some("Chat page"));
        assert_eq!(
            tree.page.viewport,
            Some(Viewport {
                width: 1280,
                height: 800
            })
        );
        assert_eq!(tree.digest.len(), 64);
    }

    #[test]
    fn test_zone_paths_in_declaration_order() {
        let tree = parse(SAMPLE).unwrap();
        let paths: Vec<String> = tree.zones().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "sidebar",
                "sidebar/user-info",
                "main",
                "main/header",
                "main/messages"
            ]
        );
    }

    #[test]
    fn test_bounds_style_and_docs() {
        let tree = parse(SAMPLE).unwrap();
        let sidebar = zone(&tree, "sidebar");
        assert_eq!(sidebar.bounds, Some(Bounds::new(0, 0, 280, 800)));
        assert!(sidebar.doc.as_deref().unwrap().contains("SIDEBAR"));
        match &sidebar.style["bg"] {
            StyleValue::Colour(token) => assert_eq!(token.rgb, Rgb::new(0xf9, 0xfa, 0xfb)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(sidebar.style["text"], StyleValue::Colour(_)));
        assert_eq!(
            sidebar.style["radius"],
            StyleValue::Literal { raw: "8".into() }
        );

        let main = zone(&tree, "main");
        match &main.style["bg"] {
            StyleValue::Colour(token) => assert_eq!(token.rgb, Rgb::WHITE),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dynamic_marker() {
        let tree = parse(SAMPLE).unwrap();
        let info = zone(&tree, "sidebar/user-info");
        assert!(info.bounds.is_none());
        assert!(info.dynamic.contains("text"));
        assert_eq!(
            info.style["text"],
            StyleValue::Dynamic {
                name: "username".into()
            }
        );
    }

    #[test]
    fn test_widgets_are_opaque() {
        let tree = parse(SAMPLE).unwrap();
        let info = zone(&tree, "sidebar/user-info");
        match &info.children[0] {
            Node::Widget(w) => {
                assert_eq!(w.name, "Avatar");
                assert_eq!(w.raw, "Avatar(size: 32, src: 'me.png')");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_zones_inside_widgets_are_hoisted() {
        let tree = parse(SAMPLE).unwrap();
        let main = zone(&tree, "main");
        let names: Vec<&str> = main.child_zones().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["header", "messages"]);
        assert!(main
            .children
            .iter()
            .any(|n| matches!(n, Node::Widget(w) if w.name == "Column")));
    }

    #[test]
    fn test_assert_block() {
        let tree = parse(SAMPLE).unwrap();
        let a = zone(&tree, "main/messages").assertions.clone().unwrap();
        assert_eq!(a.min_transitions_v, Some(10.0));
        assert_eq!(a.min_transitions_h, Some(2.5));
        assert_eq!(a.min_regions, Some(3));
        assert!(a.non_blank);
    }

    #[test]
    fn test_missing_page() {
        let err = parse("Zone('x', bounds: Bounds(0, 0, 1, 1))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingPage);
    }

    #[test]
    fn test_unbalanced_delimiters() {
        let err = parse("Page('p',\n  Zone('a', bounds: Bounds(0, 0, 1, 1)\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiters);
    }

    #[test]
    fn test_invalid_bounds_shapes() {
        for bad in [
            "Bounds(0, 0, 100)",
            "Bounds(0, 0, 100, 50, 3)",
            "Bounds(0, 0, 'a', 50)",
            "Bounds(0, 0, 10.5, 50)",
            "Bounds(-1, 0, 10, 50)",
            "Bounds(50, 0, 10, 50)",
            "Bounds(0, 10, 10, 10)",
        ] {
            let src = format!("Page('p', Zone('z', bounds: {bad}))");
            let err = parse(&src).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::InvalidBounds, "{bad}");
        }
    }

    #[test]
    fn test_bounds_key_requires_bounds_call() {
        let err = parse("Page('p', Zone('z', bounds: [0, 0, 1, 1]))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidBounds);
    }

    #[test]
    fn test_unknown_colour() {
        let err = parse("Page('p', Zone('z', style: Style(bg: tw.doesNotExist)))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownColour);
        let err = parse("Page('p', Zone('z', style: Style(bg: '#12')))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownColour);
        assert_eq!(err.location.line, 1);
    }

    #[test]
    fn test_color_alias() {
        let tree = parse("Page('p', Zone('z', style: Style(color: 'red500')))").unwrap();
        assert!(matches!(
            zone(&tree, "z").style["colour"],
            StyleValue::Colour(_)
        ));
    }

    #[test]
    fn test_duplicate_zone_names() {
        let err = parse("Page('p', Zone('a'), Zone('a'))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateZone);
        assert!(parse("Page('p', Zone('a', Zone('a')))").is_ok());
    }

    #[test]
    fn test_invalid_assert_arguments() {
        for bad in [
            "Assert(min_regions: 2.5)",
            "Assert(non_blank: 1)",
            "Assert(max_things: 3)",
            "Assert(10)",
        ] {
            let src = format!("Page('p', Zone('z', assert: {bad}))");
            assert_eq!(
                parse(&src).unwrap_err().kind,
                ParseErrorKind::InvalidArguments,
                "{bad}"
            );
        }
    }

    #[test]
    fn test_structural_in_wrong_place() {
        let err = parse("Page('p', Bounds(0, 0, 1, 1))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidArguments);
        let err = parse("Page('p', Zone('z', viewport: Viewport(1, 1)))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidArguments);
    }

    #[test]
    fn test_multiple_pages_rejected() {
        let err = parse("Page('a')\nPage('b')").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidArguments);
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn test_tolerates_foreign_syntax() {
        let src = r#"
import 'package:gux/gux.dart';

final page = Page('odd',
  viewport: Viewport(100, 100),
  Zone('z',
    bounds: Bounds(0, 0, 100, 100),
    Chart(data: {a: 1, b: [2, 3]}, colour: Colors.red.withOpacity(0.5), 1 + 2),
  ),
);
"#;
        let tree = parse(src).unwrap();
        let z = zone(&tree, "z");
        assert_eq!(z.children.len(), 1);
    }

    #[test]
    fn test_const_and_new_prefixed_zones() {
        let tree = parse(
            "Page('p', const Zone('header', bounds: Bounds(0, 0, 10, 10), style: const Style(bg: '#000000')), new Zone('footer'))",
        )
        .unwrap();
        let header = zone(&tree, "header");
        assert_eq!(header.bounds, Some(Bounds::new(0, 0, 10, 10)));
        assert!(header.is_required());
        assert!(tree.zone("footer").is_some());
    }

    #[test]
    fn test_zones_in_typed_lists_are_kept() {
        let src = r#"
Page('p',
  Zone('main',
    children: <Widget>[
      Zone('header', bounds: Bounds(0, 0, 10, 10), style: Style(bg: '#000000')),
      Padding(padding: EdgeInsets.all(4), child: const Zone('body')),
    ],
  ),
)
"#;
        let tree = parse(src).unwrap();
        let paths: Vec<String> = tree.zones().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["main", "main/header", "main/body"]);
    }

    #[test]
    fn test_zone_inside_expression_is_recovered() {
        let tree = parse("Page('p', flag ? Zone('a') : Zone('b'))").unwrap();
        assert!(tree.zone("a").is_some());
        assert!(tree.zone("b").is_some());
    }

    #[test]
    fn test_non_colour_values_on_colour_properties() {
        for value in ["0xffffff", "Color(0xFF000000)", "42", "true", "Colors.red.withOpacity(0.5)"] {
            let src = format!("Page('p', Zone('z', style: Style(bg: {value})))");
            let err = parse(&src).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::UnknownColour, "{value}");
        }
        let tree = parse("Page('p', Zone('z', style: Style(radius: 0xff)))").unwrap();
        assert!(matches!(
            zone(&tree, "z").style.get("radius"),
            Some(StyleValue::Literal { .. })
        ));
    }

    #[test]
    fn test_slash_in_zone_name_rejected() {
        let err = parse("Page('p', Zone('a/b'), Zone('a', Zone('b')))").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidArguments);
        assert_eq!(err.location.offset, 10);
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse(SAMPLE).unwrap(), parse(SAMPLE).unwrap());
    }
}
