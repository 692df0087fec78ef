use crate::{Color, Timestamp};
use euclid::default::{Point2D, Rect};
use serde::{Deserialize, Serialize};

pub type Point = Point2D<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawMeta {
    pub author: String,
    pub timestamp: Timestamp,
    pub color: Color,
}

impl DrawMeta {
    pub fn new(author: impl Into<String>, timestamp: Timestamp, color: Color) -> Self {
        Self {
            author: author.into(),
            timestamp,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Line,
    Rectangle,
    Circle,
    Triangle,
}

/// One immutable unit of canvas mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Stroke {
        meta: DrawMeta,
        points: Vec<Point>,
    },
    Shape {
        meta: DrawMeta,
        kind: ShapeKind,
        start: Point,
        end: Point,
    },
    Text {
        meta: DrawMeta,
        anchor: Point,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedCommand {
    EmptyAuthor,
    NonFiniteCoordinate,
    EmptyStroke,
    EmptyText,
}

impl std::fmt::Display for MalformedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAuthor => write!(f, "command has no author"),
            Self::NonFiniteCoordinate => write!(f, "coordinate is not a finite number"),
            Self::EmptyStroke => write!(f, "stroke has no points"),
            Self::EmptyText => write!(f, "text has no content"),
        }
    }
}

impl DrawCommand {
    pub fn shape(meta: DrawMeta, kind: ShapeKind, start: Point, end: Point) -> Self {
        Self::Shape {
            meta,
            kind,
            start,
            end,
        }
    }

    pub fn meta(&self) -> &DrawMeta {
        match self {
            Self::Stroke { meta, .. } | Self::Shape { meta, .. } | Self::Text { meta, .. } => meta,
        }
    }

    pub fn author(&self) -> &str {
        &self.meta().author
    }

    pub fn timestamp(&self) -> Timestamp {
        self.meta().timestamp
    }

    pub fn color(&self) -> Color {
        self.meta().color
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Stroke { .. } => "stroke",
            Self::Shape {
                kind: ShapeKind::Line,
                ..
            } => "line",
            Self::Shape {
                kind: ShapeKind::Rectangle,
                ..
            } => "rectangle",
            Self::Shape {
                kind: ShapeKind::Circle,
                ..
            } => "circle",
            Self::Shape {
                kind: ShapeKind::Triangle,
                ..
            } => "triangle",
            Self::Text { .. } => "text",
        }
    }

    /// Bounding rectangle, derived from the stored geometry on every call.
    pub fn bounds(&self) -> Option<Rect<f32>> {
        match self {
            Self::Shape { start, end, .. } => Some(Rect::new(
                start.min(*end),
                (*end - *start).abs().to_size(),
            )),
            Self::Stroke { points, .. } => {
                let first = points.first()?;
                let (min, max) = points
                    .iter()
                    .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
                Some(Rect::new(min, (max - min).to_size()))
            }
            Self::Text { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), MalformedCommand> {
        if self.author().is_empty() {
            return Err(MalformedCommand::EmptyAuthor);
        }
        let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
        match self {
            Self::Stroke { points, .. } => {
                if points.is_empty() {
                    Err(MalformedCommand::EmptyStroke)
                } else if !points.iter().all(finite) {
                    Err(MalformedCommand::NonFiniteCoordinate)
                } else {
                    Ok(())
                }
            }
            Self::Shape { start, end, .. } => {
                if finite(start) && finite(end) {
                    Ok(())
                } else {
                    Err(MalformedCommand::NonFiniteCoordinate)
                }
            }
            Self::Text { anchor, text, .. } => {
                if text.is_empty() {
                    Err(MalformedCommand::EmptyText)
                } else if !finite(anchor) {
                    Err(MalformedCommand::NonFiniteCoordinate)
                } else {
                    Ok(())
                }
            }
        }
    }
}
