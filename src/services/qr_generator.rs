use qrcode::render::svg;
use qrcode::QrCode;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),
}

/// Renders a visitor code as an SVG QR image for gate or lobby display.
/// The QR carries the bare code string, the same thing a visitor would
/// type or read out to security.
pub fn generate_code_svg(code: &str) -> Result<String, QrGenerationError> {
    let qr = QrCode::new(code.as_bytes())?;

    let svg = qr.render::<svg::Color>().min_dimensions(200, 200).build();

    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_svg_for_a_code() {
        let svg = generate_code_svg("XK42PM").unwrap();
        assert!(svg.contains("<svg"));
    }
}
