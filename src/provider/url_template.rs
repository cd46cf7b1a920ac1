//! `{z}/{x}/{y}` URL templates.
//!
//! Templates are parsed once into literal and placeholder segments. Rendering substitutes
//! `{z}`, `{x}`, `{y}`, and `{layer}`; every other `{...}` sequence, and any unbalanced brace, is
//! emitted verbatim.

// self
use crate::{_prelude::*, error::ConfigError, tile::TileRequest};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Z,
	X,
	Y,
	Layer,
}

/// Pre-parsed tile URL template.
#[derive(Clone, PartialEq, Eq)]
pub struct UrlTemplate {
	raw: String,
	segments: Vec<Segment>,
}
impl UrlTemplate {
	/// Parses `template` and checks that it renders to an absolute URL.
	pub fn parse(template: impl Into<String>) -> Result<Self, ConfigError> {
		let raw = template.into();
		let mut segments = Vec::new();
		let mut literal = String::new();

		scan(&raw, |piece| match piece {
			Piece::Text(text) => literal.push_str(text),
			Piece::Placeholder(name) => {
				let segment = match name {
					"z" => Segment::Z,
					"x" => Segment::X,
					"y" => Segment::Y,
					"layer" => Segment::Layer,
					other => {
						literal.push('{');
						literal.push_str(other);
						literal.push('}');

						return;
					},
				};

				if !literal.is_empty() {
					segments.push(Segment::Literal(std::mem::take(&mut literal)));
				}

				segments.push(segment);
			},
		});

		if !literal.is_empty() {
			segments.push(Segment::Literal(literal));
		}

		let template = Self { raw, segments };
		let probe = template.render_parts("layer", 0, 0, 0);

		Url::parse(&probe)
			.map_err(|source| ConfigError::InvalidTemplate { template: template.raw.clone(), source })?;

		Ok(template)
	}

	/// Returns the template as configured.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Substitutes the request's coordinates.
	pub fn render(&self, request: &TileRequest) -> String {
		self.render_parts(&request.layer, request.z, request.x, request.y)
	}

	/// Substitutes the request's coordinates and parses the result.
	pub fn render_url(&self, request: &TileRequest) -> Result<Url, url::ParseError> {
		Url::parse(&self.render(request))
	}

	fn render_parts(&self, layer: &str, z: u8, x: u32, y: u32) -> String {
		let mut out = String::with_capacity(self.raw.len() + 16);

		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => out.push_str(text),
				Segment::Z => out.push_str(&z.to_string()),
				Segment::X => out.push_str(&x.to_string()),
				Segment::Y => out.push_str(&y.to_string()),
				Segment::Layer => out.push_str(layer),
			}
		}

		out
	}
}
impl Debug for UrlTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "UrlTemplate({})", self.raw)
	}
}
impl Display for UrlTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.raw)
	}
}
impl FromStr for UrlTemplate {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// Replaces `{name}` placeholders for which `lookup` returns a value; keeps the rest verbatim.
pub(crate) fn expand(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
	let mut out = String::with_capacity(template.len());

	scan(template, |piece| match piece {
		Piece::Text(text) => out.push_str(text),
		Piece::Placeholder(name) => match lookup(name) {
			Some(value) => out.push_str(&value),
			None => {
				out.push('{');
				out.push_str(name);
				out.push('}');
			},
		},
	});

	out
}

enum Piece<'a> {
	Text(&'a str),
	Placeholder(&'a str),
}

// A placeholder is `{` followed by a non-empty run without braces and a closing `}`.
fn scan<'a>(template: &'a str, mut emit: impl FnMut(Piece<'a>)) {
	let mut rest = template;

	while let Some(open) = rest.find('{') {
		let (text, tail) = rest.split_at(open);
		let inner = &tail[1..];
		let close = inner.find(['{', '}']);

		match close {
			Some(end) if end > 0 && inner.as_bytes()[end] == b'}' => {
				if !text.is_empty() {
					emit(Piece::Text(text));
				}

				emit(Piece::Placeholder(&inner[..end]));

				rest = &inner[end + 1..];
			},
			_ => {
				emit(Piece::Text(&rest[..open + 1]));

				rest = inner;
			},
		}
	}

	if !rest.is_empty() {
		emit(Piece::Text(rest));
	}
}
