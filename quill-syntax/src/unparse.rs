//! Writing objects and content streams back into PDF syntax.

use crate::config::DEFAULT_MAX_DEPTH;
use crate::content::Instruction;
use crate::error::{Error, Result};
use crate::object::{Dictionary, InlineImage, Name, Object};
use crate::trivia::is_delimiter_character;
use std::io::Write;

/// Options for unparsing.
#[derive(Debug, Clone)]
pub struct UnparseOptions {
    /// Render reals from their value with this many digits after the decimal
    /// point. `None` writes the text they were read from.
    pub real_precision: Option<u8>,
    /// The maximum nesting depth.
    pub max_depth: usize,
    /// Put every dictionary entry on its own line.
    pub pretty: bool,
}

impl Default for UnparseOptions {
    fn default() -> Self {
        Self {
            real_precision: None,
            max_depth: DEFAULT_MAX_DEPTH,
            pretty: false,
        }
    }
}

/// Unparse an object with the default options.
pub fn unparse(obj: &Object) -> Result<Vec<u8>> {
    unparse_with(obj, &UnparseOptions::default())
}

/// Unparse an object.
///
/// References are written as `N G R` and never followed. Streams are written as
/// their dictionary.
pub fn unparse_with(obj: &Object, options: &UnparseOptions) -> Result<Vec<u8>> {
    let mut out = vec![];
    write_object(&mut out, obj, options)?;

    Ok(out)
}

/// Append the syntax of `obj` to `out`.
pub fn write_object(out: &mut Vec<u8>, obj: &Object, options: &UnparseOptions) -> Result<()> {
    Unparser { out, options }.object(obj, 0)
}

/// Unparse a sequence of instructions into the body of a content stream.
pub fn unparse_content_stream(instructions: &[Instruction]) -> Result<Vec<u8>> {
    unparse_content_stream_with(instructions, &UnparseOptions::default())
}

/// Like [`unparse_content_stream`], with explicit options.
pub fn unparse_content_stream_with(
    instructions: &[Instruction],
    options: &UnparseOptions,
) -> Result<Vec<u8>> {
    let mut out = vec![];
    let mut u = Unparser {
        out: &mut out,
        options,
    };

    for instruction in instructions {
        match instruction.operands.as_slice() {
            [Object::InlineImage(image)] if instruction.operator.is_inline_image() => {
                u.inline_image(image, 0)?;
            }
            operands => {
                for operand in operands {
                    u.object(operand, 0)?;
                    u.out.push(b' ');
                }

                u.out.extend_from_slice(instruction.operator.as_bytes());
            }
        }

        u.out.push(b'\n');
    }

    Ok(out)
}

struct Unparser<'a> {
    out: &'a mut Vec<u8>,
    options: &'a UnparseOptions,
}

impl Unparser<'_> {
    fn object(&mut self, obj: &Object, depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::RecursionLimitExceeded(self.options.max_depth));
        }

        match obj {
            Object::Null => self.out.extend_from_slice(b"null"),
            Object::Boolean(true) => self.out.extend_from_slice(b"true"),
            Object::Boolean(false) => self.out.extend_from_slice(b"false"),
            Object::Integer(i) => {
                let _ = write!(self.out, "{i}");
            }
            Object::Real(r) => match self.options.real_precision {
                Some(p) => self.out.extend_from_slice(r.rendered(p).as_bytes()),
                None => self.out.extend_from_slice(r.text().as_bytes()),
            },
            Object::String(s) => write_string(self.out, s.as_bytes()),
            Object::Name(n) => write_name(self.out, n),
            Object::Array(a) => {
                self.out.push(b'[');

                for (i, item) in a.iter().enumerate() {
                    if i > 0 {
                        self.out.push(b' ');
                    }

                    self.object(item, depth + 1)?;
                }

                self.out.push(b']');
            }
            Object::Dictionary(d) => self.dict(d, depth)?,
            Object::Stream(s) => self.dict(s.dict(), depth)?,
            Object::Operator(op) => self.out.extend_from_slice(op.as_bytes()),
            Object::InlineImage(image) => self.inline_image(image, depth)?,
            Object::Reference(r) => {
                let id = r.id();
                let _ = write!(self.out, "{} {} R", id.num, id.generation);
            }
        }

        Ok(())
    }

    fn dict(&mut self, dict: &Dictionary, depth: usize) -> Result<()> {
        if self.options.pretty && !dict.is_empty() {
            let indent = "  ".repeat(depth + 1);
            self.out.extend_from_slice(b"<<\n");

            for (k, v) in dict.iter() {
                self.out.extend_from_slice(indent.as_bytes());
                write_name(self.out, k);
                self.out.push(b' ');
                self.object(v, depth + 1)?;
                self.out.push(b'\n');
            }

            self.out.extend_from_slice("  ".repeat(depth).as_bytes());
            self.out.extend_from_slice(b">>");

            return Ok(());
        }

        self.out.extend_from_slice(b"<<");

        for (k, v) in dict.iter() {
            self.out.push(b' ');
            write_name(self.out, k);
            self.out.push(b' ');
            self.object(v, depth + 1)?;
        }

        self.out.extend_from_slice(b" >>");

        Ok(())
    }

    fn inline_image(&mut self, image: &InlineImage, depth: usize) -> Result<()> {
        self.out.extend_from_slice(b"BI");

        for (k, v) in image.header().iter() {
            self.out.push(b' ');
            write_name(self.out, k);
            self.out.push(b' ');
            self.object(v, depth + 1)?;
        }

        self.out.extend_from_slice(b" ID ");
        self.out.extend_from_slice(image.data());
        self.out.extend_from_slice(b" EI");

        Ok(())
    }
}

/// Append a name, escaping bytes that cannot appear in a name literally.
pub fn write_name(out: &mut Vec<u8>, name: &Name) {
    out.push(b'/');

    for &b in name.payload() {
        if matches!(b, b'!'..=b'~') && !is_delimiter_character(b) && b != b'#' {
            out.push(b);
        } else {
            let _ = write!(out, "#{b:02X}");
        }
    }
}

/// Append a string in literal form, or in hexadecimal form if it contains
/// bytes that are not printable.
pub fn write_string(out: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|b| matches!(b, 0x20..=0x7e | b'\n' | b'\r' | b'\t' | 0x08 | 0x0c));

    if !printable {
        out.push(b'<');

        for b in data {
            let _ = write!(out, "{b:02x}");
        }

        out.push(b'>');

        return;
    }

    out.push(b'(');

    for &b in data {
        match b {
            b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', b]),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            _ => out.push(b),
        }
    }

    out.push(b')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Array, DocumentId, ObjectId, Real, Reference};

    fn text(obj: &Object) -> String {
        String::from_utf8(unparse(obj).unwrap()).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(text(&Object::Null), "null");
        assert_eq!(text(&Object::Boolean(true)), "true");
        assert_eq!(text(&Object::Integer(-12)), "-12");
        assert_eq!(text(&Object::Real(Real::from_text("--5"))), "--5");
        assert_eq!(text(&Object::name("/A B#").unwrap()), "/A#20B#23");
        assert_eq!(text(&Object::name("/a(b)").unwrap()), "/a#28b#29");
    }

    #[test]
    fn strings() {
        assert_eq!(text(&Object::string("a(b)\\c\n")), "(a\\(b\\)\\\\c\\n)");
        assert_eq!(text(&Object::string(vec![0xfe, 0xff, 0x00])), "<feff00>");
    }

    #[test]
    fn reals_can_be_rerendered() {
        let obj = Object::Real(Real::from_text("0.50000"));
        let options = UnparseOptions {
            real_precision: Some(3),
            ..UnparseOptions::default()
        };
        assert_eq!(unparse_with(&obj, &options).unwrap(), b"0.5");
        assert_eq!(text(&obj), "0.50000");
    }

    #[test]
    fn compound() {
        let reference = Reference::new(DocumentId::DETACHED, ObjectId::new(4, 1));
        let dict = Dictionary::new()
            .with("/Kids", Array::from(vec![Object::Reference(reference), Object::Integer(1)]))
            .unwrap();
        assert_eq!(text(&Object::Dictionary(dict.clone())), "<< /Kids [4 1 R 1] >>");

        let pretty = UnparseOptions {
            pretty: true,
            ..UnparseOptions::default()
        };
        assert_eq!(
            unparse_with(&Object::Dictionary(dict), &pretty).unwrap(),
            b"<<\n  /Kids [4 1 R 1]\n>>"
        );
        assert_eq!(text(&Object::Dictionary(Dictionary::new())), "<< >>");
    }

    #[test]
    fn depth_limit() {
        let mut obj = Object::Integer(0);

        for _ in 0..20 {
            obj = Object::Array(vec![obj].into());
        }

        let options = UnparseOptions {
            max_depth: 10,
            ..UnparseOptions::default()
        };
        assert!(matches!(
            unparse_with(&obj, &options),
            Err(Error::RecursionLimitExceeded(10))
        ));
    }

    #[test]
    fn content_stream() {
        let header = Dictionary::new().with("/W", 2).unwrap();
        let instructions = vec![
            Instruction::new(vec![], crate::object::Operator::new("q")),
            Instruction::new(
                vec![Object::Integer(1), Object::real(0.5)],
                crate::object::Operator::new("m"),
            ),
            Instruction::inline_image(InlineImage::new(header, b"\x00EI".to_vec())),
        ];

        assert_eq!(
            unparse_content_stream(&instructions).unwrap(),
            b"q\n1 0.5 m\nBI /W 2 ID \x00EI EI\n".to_vec()
        );
    }
}
