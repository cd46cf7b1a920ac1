//! Tile request and image payload types.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const LAYER_NAME_MAX_LEN: usize = 128;
// Layer names are rendered into URLs verbatim.
const LAYER_NAME_FORBIDDEN: [char; 9] = ['/', '\\', '?', '#', '%', '&', '=', '{', '}'];

/// Error returned when layer name validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum LayerNameError {
	/// The layer name was empty.
	#[error("Layer name cannot be empty.")]
	Empty,
	/// The layer name contains whitespace, a control character, or a URL delimiter.
	#[error("Layer name contains a character that is not allowed in a URL segment.")]
	InvalidCharacter,
	/// The layer name exceeded the allowed length.
	#[error("Layer name exceeds {max} bytes.")]
	TooLong {
		/// Maximum permitted byte length.
		max: usize,
	},
}

/// Validated name of the layer a tile belongs to.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerName(String);
impl LayerName {
	/// Creates a new layer name after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, LayerNameError> {
		let view = value.as_ref();

		validate(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for LayerName {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for LayerName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for LayerName {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<LayerName> for String {
	fn from(value: LayerName) -> Self {
		value.0
	}
}
impl TryFrom<String> for LayerName {
	type Error = LayerNameError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for LayerName {
	type Err = LayerNameError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for LayerName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Layer({})", self.0)
	}
}
impl Display for LayerName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate(view: &str) -> Result<(), LayerNameError> {
	if view.is_empty() {
		return Err(LayerNameError::Empty);
	}
	if view
		.chars()
		.any(|ch| ch.is_whitespace() || ch.is_control() || LAYER_NAME_FORBIDDEN.contains(&ch))
	{
		return Err(LayerNameError::InvalidCharacter);
	}
	if view.len() > LAYER_NAME_MAX_LEN {
		return Err(LayerNameError::TooLong { max: LAYER_NAME_MAX_LEN });
	}

	Ok(())
}

/// One tile addressed by layer and `z/x/y` coordinates.
///
/// Coordinates are passed through untouched; range validation belongs to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRequest {
	/// Layer the tile belongs to.
	pub layer: LayerName,
	/// Zoom level.
	pub z: u8,
	/// Column.
	pub x: u32,
	/// Row.
	pub y: u32,
}
impl TileRequest {
	/// Creates a request for the given layer and coordinates.
	pub fn new(layer: LayerName, z: u8, x: u32, y: u32) -> Self {
		Self { layer, z, x, y }
	}
}
impl Display for TileRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}/{}/{}", self.layer, self.z, self.x, self.y)
	}
}

/// Raw tile bytes returned by a provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
	/// Encoded image payload, passed through without decoding.
	pub bytes: Vec<u8>,
	/// `Content-Type` reported by the upstream, when known.
	pub content_type: Option<String>,
}
impl Image {
	/// Wraps raw bytes without a content type.
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self { bytes: bytes.into(), content_type: None }
	}

	/// Attaches a content type.
	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());

		self
	}

	/// Returns the payload size in bytes.
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	/// Returns `true` when the payload is empty.
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}
impl Debug for Image {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Image")
			.field("len", &self.bytes.len())
			.field("content_type", &self.content_type)
			.finish()
	}
}
