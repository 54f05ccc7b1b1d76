//! Document assembly: page bitmaps → one paginated PDF.
//!
//! Each bitmap becomes a JPEG image XObject on its own page. The image is
//! drawn at the full page width with its height taken from its aspect
//! ratio, anchored at the top edge. A bitmap taller than the page is not
//! cropped; the part below the bottom edge is clipped by the media box.

use crate::config::PageGeometry;
use crate::error::ExportError;
use crate::pipeline::encode::{self, EncodedPage};
use image::DynamicImage;
use lopdf::{dictionary, Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream};
use tracing::debug;

/// Accumulates pages; closed by [`DocumentAssembler::finalize`].
pub struct DocumentAssembler {
    doc: LoDocument,
    pages_id: LoObjectId,
    kids: Vec<LoObject>,
    geometry: PageGeometry,
    title: Option<String>,
    finished: Option<Vec<u8>>,
}

impl std::fmt::Debug for DocumentAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAssembler")
            .field("pages", &self.kids.len())
            .field("geometry", &self.geometry)
            .field("finalized", &self.finished.is_some())
            .finish()
    }
}

impl DocumentAssembler {
    pub fn new(geometry: PageGeometry) -> Self {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            geometry,
            title: None,
            finished: None,
        }
    }

    /// Set the document title written to the info dictionary.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = Some(title).filter(|t| !t.trim().is_empty());
        self
    }

    /// Encode `bitmap` and append it as the next page.
    ///
    /// Callers that must tell a bad bitmap apart from a closed assembler
    /// encode with [`encode::encode_page`] and use
    /// [`DocumentAssembler::append_encoded`].
    pub fn append_page(&mut self, bitmap: &DynamicImage) -> Result<(), ExportError> {
        if self.finished.is_some() {
            return Err(ExportError::AssemblerClosed);
        }
        let page = encode::encode_page(bitmap).map_err(|e| ExportError::Internal(e.to_string()))?;
        self.append_encoded(page)
    }

    /// Append an encoded page. Every page after the first starts after a
    /// page break. Fails only once the assembler is finalized.
    pub fn append_encoded(&mut self, page: EncodedPage) -> Result<(), ExportError> {
        if self.finished.is_some() {
            return Err(ExportError::AssemblerClosed);
        }

        let n = self.kids.len() + 1;
        let mut image = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        );
        image.allows_compression = false;
        let image_id = self.doc.add_object(image);

        let page_w = self.geometry.width_pt;
        let page_h = self.geometry.height_pt;
        let draw_h = page_w * page.height as f32 / page.width as f32;
        let content = format!(
            "q {:.4} 0 0 {:.4} 0 {:.4} cm /Im{n} Do Q\n",
            page_w,
            draw_h,
            page_h - draw_h
        )
        .into_bytes();
        let content_id = self.doc.add_object(LoStream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    format!("Im{n}") => image_id,
                },
            },
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        });
        self.kids.push(LoObject::Reference(page_id));
        debug!(
            "Appended page {} ({}x{} px, drawn {:.1}pt tall)",
            n, page.width, page.height, draw_h
        );
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// One break between every two consecutive pages.
    pub fn page_break_count(&self) -> usize {
        self.kids.len().saturating_sub(1)
    }

    pub fn is_finalized(&self) -> bool {
        self.finished.is_some()
    }

    /// Close the document and return the PDF bytes.
    ///
    /// Calling it again returns the same bytes.
    pub fn finalize(&mut self) -> Result<Vec<u8>, ExportError> {
        if let Some(bytes) = &self.finished {
            return Ok(bytes.clone());
        }

        self.doc.objects.insert(
            self.pages_id,
            LoObject::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids.clone(),
                "Count" => self.kids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => LoObject::string_literal(concat!("profile-export ", env!("CARGO_PKG_VERSION"))),
        };
        if let Some(title) = &self.title {
            info.set("Title", LoObject::string_literal(title.as_str()));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| ExportError::PdfWriteFailed(e.to_string()))?;
        debug!("Finalized PDF: {} pages, {} bytes", self.kids.len(), bytes.len());

        self.finished = Some(bytes.clone());
        Ok(bytes)
    }
}
