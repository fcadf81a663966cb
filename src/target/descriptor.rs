//! Target descriptors: per-axis categorical distributions and their collapsed form.
//!
//! A target is described along four independent axes:
//!
//! ```text
//! shape               9 categories
//! alphanumeric       36 categories (classifier output order)
//! shape color         8 categories
//! alphanumeric color  8 categories
//! ```
//!
//! The category order is part of the vector layout and must not change:
//! descriptors written to frame logs are replayed against it.

use std::ops::{Add, Div};

use nalgebra::SVector;
use serde::{Deserialize, Serialize};

pub const NUM_SHAPES: usize = 9;
pub const NUM_ALPHANUMERICS: usize = 36;
pub const NUM_COLORS: usize = 8;

/// Alphanumerics in the order the letter classifier emits them.
pub const ALPHANUMERICS: &str = "01ABCDEFGHIJ2KLMNOPQRST3UVWXYZ456789";

pub type ShapeProbs = SVector<f64, NUM_SHAPES>;
pub type AlphanumericProbs = SVector<f64, NUM_ALPHANUMERICS>;
pub type ColorProbs = SVector<f64, NUM_COLORS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Semicircle,
    Quartercircle,
    Triangle,
    Rectangle,
    Pentagon,
    Star,
    Cross,
    Person,
}

impl Shape {
    pub const ALL: [Shape; NUM_SHAPES] = [
        Shape::Circle,
        Shape::Semicircle,
        Shape::Quartercircle,
        Shape::Triangle,
        Shape::Rectangle,
        Shape::Pentagon,
        Shape::Star,
        Shape::Cross,
        Shape::Person,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Semicircle => "semicircle",
            Shape::Quartercircle => "quartercircle",
            Shape::Triangle => "triangle",
            Shape::Rectangle => "rectangle",
            Shape::Pentagon => "pentagon",
            Shape::Star => "star",
            Shape::Cross => "cross",
            Shape::Person => "person",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Orange,
    Green,
    Blue,
    Purple,
    White,
    Black,
    Brown,
}

impl Color {
    pub const ALL: [Color; NUM_COLORS] = [
        Color::Red,
        Color::Orange,
        Color::Green,
        Color::Blue,
        Color::Purple,
        Color::White,
        Color::Black,
        Color::Brown,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::White => "white",
            Color::Black => "black",
            Color::Brown => "brown",
        }
    }
}

/// A single uppercase letter or digit from [`ALPHANUMERICS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Alphanumeric(char);

impl Alphanumeric {
    /// Returns `None` for characters outside the classifier's category set.
    pub fn new(c: char) -> Option<Self> {
        let c = c.to_ascii_uppercase();
        ALPHANUMERICS.contains(c).then_some(Self(c))
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        ALPHANUMERICS.chars().nth(idx).map(Self)
    }

    pub fn index(self) -> usize {
        // Constructors guarantee membership.
        ALPHANUMERICS.find(self.0).unwrap_or(0)
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl TryFrom<String> for Alphanumeric {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut chars = value.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Alphanumeric::new(c).ok_or_else(|| format!("'{}' is not a known alphanumeric", c))
            }
            _ => Err(format!("expected a single character, got '{}'", value)),
        }
    }
}

impl From<Alphanumeric> for String {
    fn from(value: Alphanumeric) -> Self {
        value.0.to_string()
    }
}

/// Four independent categorical distributions describing one target.
///
/// Values are not required to be normalized: fused descriptors hold running
/// sums and are normalized when read (see [`normalized`](Self::normalized)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticTargetDescriptor {
    pub shape: ShapeProbs,
    pub alphanumeric: AlphanumericProbs,
    pub shape_color: ColorProbs,
    pub alphanumeric_color: ColorProbs,
}

impl ProbabilisticTargetDescriptor {
    pub fn new(
        shape: ShapeProbs,
        alphanumeric: AlphanumericProbs,
        shape_color: ColorProbs,
        alphanumeric_color: ColorProbs,
    ) -> Self {
        Self {
            shape,
            alphanumeric,
            shape_color,
            alphanumeric_color,
        }
    }

    /// The "no class evidence" descriptor.
    pub fn uniform() -> Self {
        Self {
            shape: uniform_axis(),
            alphanumeric: uniform_axis(),
            shape_color: uniform_axis(),
            alphanumeric_color: uniform_axis(),
        }
    }

    /// All-zero descriptor, the identity for running sums.
    pub fn zeros() -> Self {
        Self {
            shape: ShapeProbs::zeros(),
            alphanumeric: AlphanumericProbs::zeros(),
            shape_color: ColorProbs::zeros(),
            alphanumeric_color: ColorProbs::zeros(),
        }
    }

    /// Each axis scaled to sum to 1. Axes with no mass become uniform.
    pub fn normalized(&self) -> Self {
        Self {
            shape: normalize_axis(&self.shape),
            alphanumeric: normalize_axis(&self.alphanumeric),
            shape_color: normalize_axis(&self.shape_color),
            alphanumeric_color: normalize_axis(&self.alphanumeric_color),
        }
    }

    /// Normalized copy in which any axis holding NaN, infinite or negative
    /// values is replaced by the uniform distribution.
    pub fn sanitized(&self) -> Self {
        Self {
            shape: sanitize_axis(&self.shape),
            alphanumeric: sanitize_axis(&self.alphanumeric),
            shape_color: sanitize_axis(&self.shape_color),
            alphanumeric_color: sanitize_axis(&self.alphanumeric_color),
        }
    }

    /// True when every axis is a valid, normalized distribution.
    pub fn is_valid(&self) -> bool {
        axis_is_valid(&self.shape)
            && axis_is_valid(&self.alphanumeric)
            && axis_is_valid(&self.shape_color)
            && axis_is_valid(&self.alphanumeric_color)
    }

    /// Most likely category per axis. Ties resolve to the lower category index.
    pub fn collapse_to_certain(&self) -> CertainTargetDescriptor {
        CertainTargetDescriptor {
            shape: Shape::from_index(argmax(&self.shape)),
            alphanumeric: Alphanumeric::from_index(argmax(&self.alphanumeric)),
            shape_color: Color::from_index(argmax(&self.shape_color)),
            alphanumeric_color: Color::from_index(argmax(&self.alphanumeric_color)),
        }
    }

    /// Probability mass this descriptor assigns to the queried categories,
    /// summed over the four axes. Unknown query axes contribute nothing.
    ///
    /// The descriptor is normalized first, so running sums can be scored directly.
    pub fn match_score(&self, query: &CertainTargetDescriptor) -> f64 {
        let probs = self.normalized();
        let mut score = 0.0;
        if let Some(shape) = query.shape {
            score += probs.shape[shape.index()];
        }
        if let Some(alnum) = query.alphanumeric {
            score += probs.alphanumeric[alnum.index()];
        }
        if let Some(color) = query.shape_color {
            score += probs.shape_color[color.index()];
        }
        if let Some(color) = query.alphanumeric_color {
            score += probs.alphanumeric_color[color.index()];
        }
        score
    }
}

impl Default for ProbabilisticTargetDescriptor {
    fn default() -> Self {
        Self::uniform()
    }
}

impl Add for ProbabilisticTargetDescriptor {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        &self + &other
    }
}

impl<'a> Add<&'a ProbabilisticTargetDescriptor> for &'a ProbabilisticTargetDescriptor {
    type Output = ProbabilisticTargetDescriptor;

    fn add(self, other: &'a ProbabilisticTargetDescriptor) -> ProbabilisticTargetDescriptor {
        ProbabilisticTargetDescriptor {
            shape: self.shape + other.shape,
            alphanumeric: self.alphanumeric + other.alphanumeric,
            shape_color: self.shape_color + other.shape_color,
            alphanumeric_color: self.alphanumeric_color + other.alphanumeric_color,
        }
    }
}

impl Div<f64> for ProbabilisticTargetDescriptor {
    type Output = Self;

    fn div(self, scalar: f64) -> Self {
        Self {
            shape: self.shape / scalar,
            alphanumeric: self.alphanumeric / scalar,
            shape_color: self.shape_color / scalar,
            alphanumeric_color: self.alphanumeric_color / scalar,
        }
    }
}

impl std::fmt::Display for ProbabilisticTargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let probs = self.normalized();
        let certain = probs.collapse_to_certain();
        write!(
            f,
            "{} ({:.3}) {} ({:.3}) {} ({:.3}) {} ({:.3})",
            name_or_unknown(certain.shape_color.map(Color::name)),
            probs.shape_color.max(),
            name_or_unknown(certain.shape.map(Shape::name)),
            probs.shape.max(),
            name_or_unknown(certain.alphanumeric_color.map(Color::name)),
            probs.alphanumeric_color.max(),
            certain.alphanumeric.map(|a| a.as_char()).unwrap_or('?'),
            probs.alphanumeric.max(),
        )
    }
}

/// A fully specified (or partially unknown) target description.
///
/// `None` means the value is unknown or does not apply (a person has no
/// letter). Catalog files spell these out in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CertainTargetDescriptor {
    #[serde(default)]
    pub shape: Option<Shape>,
    #[serde(default)]
    pub alphanumeric: Option<Alphanumeric>,
    #[serde(default)]
    pub shape_color: Option<Color>,
    #[serde(default)]
    pub alphanumeric_color: Option<Color>,
}

impl CertainTargetDescriptor {
    pub fn new(
        shape_color: Color,
        shape: Shape,
        alphanumeric_color: Color,
        alphanumeric: Alphanumeric,
    ) -> Self {
        Self {
            shape: Some(shape),
            alphanumeric: Some(alphanumeric),
            shape_color: Some(shape_color),
            alphanumeric_color: Some(alphanumeric_color),
        }
    }

    /// Build from raw category indices. Returns `None` if any index is out of range.
    pub fn from_indices(
        shape: usize,
        alphanumeric: usize,
        shape_color: usize,
        alphanumeric_color: usize,
    ) -> Option<Self> {
        Some(Self {
            shape: Some(Shape::from_index(shape)?),
            alphanumeric: Some(Alphanumeric::from_index(alphanumeric)?),
            shape_color: Some(Color::from_index(shape_color)?),
            alphanumeric_color: Some(Color::from_index(alphanumeric_color)?),
        })
    }

    /// Category indices in the order (shape color, shape, alphanumeric color, alphanumeric).
    pub fn to_indices(&self) -> (Option<usize>, Option<usize>, Option<usize>, Option<usize>) {
        (
            self.shape_color.map(Color::index),
            self.shape.map(Shape::index),
            self.alphanumeric_color.map(Color::index),
            self.alphanumeric.map(Alphanumeric::index),
        )
    }

    /// One-hot distributions; unknown axes become uniform.
    pub fn as_probabilistic(&self) -> ProbabilisticTargetDescriptor {
        ProbabilisticTargetDescriptor {
            shape: one_hot_or_uniform(self.shape.map(Shape::index)),
            alphanumeric: one_hot_or_uniform(self.alphanumeric.map(Alphanumeric::index)),
            shape_color: one_hot_or_uniform(self.shape_color.map(Color::index)),
            alphanumeric_color: one_hot_or_uniform(self.alphanumeric_color.map(Color::index)),
        }
    }
}

impl std::fmt::Display for CertainTargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            name_or_unknown(self.shape_color.map(Color::name)),
            name_or_unknown(self.shape.map(Shape::name)),
            name_or_unknown(self.alphanumeric_color.map(Color::name)),
            self.alphanumeric
                .map(|a| a.as_char().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        )
    }
}

fn name_or_unknown(name: Option<&'static str>) -> &'static str {
    name.unwrap_or("unknown")
}

fn uniform_axis<const N: usize>() -> SVector<f64, N> {
    SVector::<f64, N>::repeat(1.0 / N as f64)
}

fn one_hot_or_uniform<const N: usize>(idx: Option<usize>) -> SVector<f64, N> {
    match idx {
        Some(i) if i < N => {
            let mut v = SVector::<f64, N>::zeros();
            v[i] = 1.0;
            v
        }
        _ => uniform_axis(),
    }
}

fn normalize_axis<const N: usize>(v: &SVector<f64, N>) -> SVector<f64, N> {
    let sum = v.sum();
    if sum > 0.0 && sum.is_finite() {
        v / sum
    } else {
        uniform_axis()
    }
}

fn sanitize_axis<const N: usize>(v: &SVector<f64, N>) -> SVector<f64, N> {
    if v.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return uniform_axis();
    }
    normalize_axis(v)
}

fn axis_is_valid<const N: usize>(v: &SVector<f64, N>) -> bool {
    v.iter().all(|p| p.is_finite() && *p >= 0.0) && (v.sum() - 1.0).abs() < 1e-6
}

fn argmax<const N: usize>(v: &SVector<f64, N>) -> usize {
    let mut best = 0;
    for i in 1..N {
        if v[i] > v[best] {
            best = i;
        }
    }
    best
}
