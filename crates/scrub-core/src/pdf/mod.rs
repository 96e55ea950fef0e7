//! PDF unlocking and text extraction.

mod extractor;
mod unlock;

pub use extractor::PdfTextExtractor;
pub use unlock::InProcessUnlocker;
#[cfg(feature = "native")]
pub use unlock::ExternalToolUnlocker;

use crate::error::{ExtractError, UnlockError};
use crate::models::config::{UnlockConfig, UnlockStrategy};

/// Removes encryption and permission restrictions from a PDF.
///
/// Implementations must leave page content unchanged and be idempotent on
/// documents that are already unrestricted.
pub trait Unlocker {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Return an unrestricted copy of `document`.
    fn unlock(&self, document: &[u8]) -> Result<Vec<u8>, UnlockError>;
}

/// Reads the plain text of an unlocked PDF.
pub trait TextExtractor {
    /// Concatenate the text of every page in page order.
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError>;
}

impl<T: Unlocker + ?Sized> Unlocker for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn unlock(&self, document: &[u8]) -> Result<Vec<u8>, UnlockError> {
        (**self).unlock(document)
    }
}

impl<T: TextExtractor + ?Sized> TextExtractor for Box<T> {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
        (**self).extract_text(document)
    }
}

/// Build the unlocker selected in configuration.
///
/// Without the `native` feature the external tool is unavailable and the
/// in-process unlocker is always returned.
pub fn unlocker_from_config(config: &UnlockConfig) -> Box<dyn Unlocker> {
    match config.strategy {
        UnlockStrategy::InProcess => Box::new(InProcessUnlocker::new()),
        #[cfg(feature = "native")]
        UnlockStrategy::ExternalTool => Box::new(
            ExternalToolUnlocker::new(&config.tool)
                .with_args(config.tool_args.iter().cloned())
                .with_timeout(config.timeout()),
        ),
        #[cfg(not(feature = "native"))]
        UnlockStrategy::ExternalTool => {
            tracing::warn!("external unlock tool unavailable in this build, using in-process unlocker");
            Box::new(InProcessUnlocker::new())
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::encryption::{decrypt_object, get_encryption_key};
    use lopdf::{dictionary, Document, Object, StringFormat, Stream};

    /// Build an unencrypted PDF with one page per entry; each line is drawn
    /// 14pt below the previous one in Helvetica.
    pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
        save(build_document(pages))
    }

    /// Same pages as [`build_pdf`], encrypted with 40-bit RC4 (V1, R2), an
    /// empty user password and printing/copying disabled.
    pub fn build_encrypted_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = build_document(pages);

        let file_id = b"scrub-fixture-id".to_vec();
        doc.trailer.set(
            "ID",
            vec![
                Object::String(file_id.clone(), StringFormat::Hexadecimal),
                Object::String(file_id, StringFormat::Hexadecimal),
            ],
        );
        // Print (bit 3) and copy (bit 5) cleared
        let permissions: i64 = -24;
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "Length" => 40,
            "P" => permissions,
            "O" => Object::String(vec![0x5a; 32], StringFormat::Hexadecimal),
        });
        doc.trailer.set("Encrypt", encrypt_id);

        let key = get_encryption_key(&doc, "", false).unwrap();
        let user_entry = rc4(&key, &PASSWORD_PADDING);
        doc.get_object_mut(encrypt_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("U", Object::String(user_entry, StringFormat::Hexadecimal));

        // RC4 is symmetric, so the per-object decrypt doubles as encrypt
        for (&id, object) in doc.objects.iter_mut() {
            if id == encrypt_id {
                continue;
            }
            if let Object::Stream(_) = object {
                let cipher = decrypt_object(&key, id, &*object, false).unwrap();
                if let Object::Stream(stream) = object {
                    stream.set_content(cipher);
                }
            }
        }

        assert!(doc.is_encrypted());
        save(doc)
    }

    const PASSWORD_PADDING: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
        0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
    ];

    fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut state: Vec<u8> = (0..=255).collect();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, j as usize);
        }

        let (mut i, mut j) = (0u8, 0u8);
        data.iter()
            .map(|byte| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(state[i as usize]);
                state.swap(i as usize, j as usize);
                let k = state[state[i as usize].wrapping_add(state[j as usize]) as usize];
                byte ^ k
            })
            .collect()
    }

    fn save(mut doc: Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn build_document(pages: &[&[&str]]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::with_capacity(pages.len());
        for lines in pages {
            let mut content = String::from("BT /F1 12 Tf 72 720 Td");
            for (i, line) in lines.iter().enumerate() {
                if i > 0 {
                    content.push_str(" 0 -14 Td");
                }
                content.push_str(&format!(" ({}) Tj", line));
            }
            content.push_str(" ET");

            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => Object::Reference(font_id),
                    },
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }
}
