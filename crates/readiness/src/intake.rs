//! Upload intake
//!
//! Validates what the user handed us before any check runs: the file must be a
//! PNG, JPEG or SVG, the image must have known dimensions and the print width
//! must be positive.

use pressready_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIME types accepted at upload
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/svg+xml"];

/// File extensions accepted at upload
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "svg"];

/// Default print width offered to the user, in inches
pub const DEFAULT_PRINT_WIDTH_IN: f64 = 12.0;

/// Image container format of an uploaded design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Png,
    Jpeg,
    Svg,
}

impl FileFormat {
    /// Detect the format from a file name and an optional MIME type.
    ///
    /// The upload is accepted when either the MIME type or the extension is
    /// recognised. A JPEG signal from either source wins, since JPEG is the
    /// only format without an alpha channel.
    pub fn detect(file_name: &str, mime_type: Option<&str>) -> Result<Self> {
        let extension = file_extension(file_name);
        let mime = mime_type.map(|m| m.trim().to_ascii_lowercase());
        let mime = mime.as_deref().unwrap_or("");

        let mime_ok = ACCEPTED_MIME_TYPES.contains(&mime);
        let extension_ok = ACCEPTED_EXTENSIONS.contains(&extension.as_str());

        if !mime_ok && !extension_ok {
            return Err(Error::UnsupportedFormat(
                "Please upload a PNG, JPG/JPEG, or SVG file.".to_string(),
            ));
        }

        let format = if extension == "jpg" || extension == "jpeg" || mime == "image/jpeg" {
            FileFormat::Jpeg
        } else if extension == "svg" || mime == "image/svg+xml" {
            FileFormat::Svg
        } else {
            FileFormat::Png
        };

        Ok(format)
    }

    /// Whether the format can carry transparent areas
    pub fn supports_transparency(&self) -> bool {
        !matches!(self, FileFormat::Jpeg)
    }
}

/// Lowercased text after the last `.` of a file name, empty if none
pub fn file_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Garment color the design is printed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShirtColor {
    #[serde(alias = "Light")]
    Light,
    #[serde(alias = "Dark")]
    Dark,
}

impl fmt::Display for ShirtColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShirtColor::Light => write!(f, "Light"),
            ShirtColor::Dark => write!(f, "Dark"),
        }
    }
}

impl FromStr for ShirtColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ShirtColor::Light),
            "dark" => Ok(ShirtColor::Dark),
            other => Err(Error::InvalidInput(format!(
                "unknown shirt color '{}' (expected light or dark)",
                other
            ))),
        }
    }
}

/// Print setup chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintConfig {
    /// Width of the printed design on the garment, in inches
    pub print_width_in: f64,

    pub shirt_color: ShirtColor,

    /// Whether the printer lays down a white underbase
    pub white_ink: bool,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            print_width_in: DEFAULT_PRINT_WIDTH_IN,
            shirt_color: ShirtColor::Dark,
            white_ink: true,
        }
    }
}

/// Validated input to the readiness evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInput {
    pub file_name: String,
    pub format: FileFormat,
    pub image_width_px: u32,
    pub image_height_px: u32,
    pub print: PrintConfig,
}

impl CheckInput {
    /// Validate an upload and its print setup.
    ///
    /// Returns an error instead of an input when the evaluator must not run:
    /// no file name, unsupported format, unknown dimensions or a print width
    /// that is not a positive number.
    pub fn new(
        file_name: &str,
        mime_type: Option<&str>,
        image_width_px: u32,
        image_height_px: u32,
        print: PrintConfig,
    ) -> Result<Self> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(Error::InvalidInput("Please choose a file to check.".to_string()));
        }

        let format = FileFormat::detect(file_name, mime_type)?;

        if image_width_px == 0 || image_height_px == 0 {
            return Err(Error::InvalidInput(
                "Image dimensions could not be read.".to_string(),
            ));
        }

        if !print.print_width_in.is_finite() || print.print_width_in <= 0.0 {
            return Err(Error::InvalidInput(
                "Print width must be greater than 0 inches.".to_string(),
            ));
        }

        Ok(Self {
            file_name: file_name.to_string(),
            format,
            image_width_px,
            image_height_px,
            print,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(FileFormat::detect("logo.PNG", None).unwrap(), FileFormat::Png);
        assert_eq!(FileFormat::detect("photo.jpg", None).unwrap(), FileFormat::Jpeg);
        assert_eq!(FileFormat::detect("photo.jpeg", None).unwrap(), FileFormat::Jpeg);
        assert_eq!(FileFormat::detect("vector.svg", None).unwrap(), FileFormat::Svg);
    }

    #[test]
    fn test_detect_by_mime_without_extension() {
        assert_eq!(
            FileFormat::detect("upload", Some("image/jpeg")).unwrap(),
            FileFormat::Jpeg
        );
        assert_eq!(
            FileFormat::detect("upload", Some("image/svg+xml")).unwrap(),
            FileFormat::Svg
        );
        assert_eq!(
            FileFormat::detect("upload", Some("image/png")).unwrap(),
            FileFormat::Png
        );
    }

    #[test]
    fn test_jpeg_mime_wins_over_png_extension() {
        assert_eq!(
            FileFormat::detect("art.png", Some("image/jpeg")).unwrap(),
            FileFormat::Jpeg
        );
    }

    #[test]
    fn test_rejects_unsupported() {
        let err = FileFormat::detect("anim.gif", Some("image/gif")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        assert!(FileFormat::detect("noext", None).is_err());
    }

    #[test]
    fn test_shirt_color_parse() {
        assert_eq!("Dark".parse::<ShirtColor>().unwrap(), ShirtColor::Dark);
        assert_eq!(" light ".parse::<ShirtColor>().unwrap(), ShirtColor::Light);
        assert!("heather".parse::<ShirtColor>().is_err());
    }

    #[test]
    fn test_shirt_color_accepts_capitalized_json() {
        let color: ShirtColor = serde_json::from_str("\"Dark\"").unwrap();
        assert_eq!(color, ShirtColor::Dark);
        assert_eq!(serde_json::to_string(&ShirtColor::Light).unwrap(), "\"light\"");
    }

    #[test]
    fn test_check_input_gates_print_width() {
        for width in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let print = PrintConfig {
                print_width_in: width,
                ..PrintConfig::default()
            };
            let err = CheckInput::new("design.png", None, 3000, 3000, print).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "width {}", width);
        }
    }

    #[test]
    fn test_check_input_gates_dimensions_and_name() {
        let print = PrintConfig::default();
        assert!(CheckInput::new("design.png", None, 0, 100, print).is_err());
        assert!(CheckInput::new("design.png", None, 100, 0, print).is_err());
        assert!(CheckInput::new("   ", None, 100, 100, print).is_err());
    }

    #[test]
    fn test_check_input_ok() {
        let input = CheckInput::new(
            "shirt.jpg",
            Some("image/jpeg"),
            2400,
            1800,
            PrintConfig::default(),
        )
        .unwrap();
        assert_eq!(input.format, FileFormat::Jpeg);
        assert_eq!(input.print.print_width_in, 12.0);
    }
}
