//! `lopdf`-backed [`PdfRenderer`].
//!
//! Documents are fetched from `GET /uploaded_pdfs/{file_id}` and parsed
//! in memory. Page geometry comes from the page's `MediaBox`, inherited
//! through the page tree when the page itself has none, with `/Rotate`
//! of 90 or 270 swapping width and height. A page tree with no MediaBox
//! at all is treated as US Letter.
//!
//! Only the surface geometry is produced here. Rasterizing the page into
//! pixels is left to whatever embeds the viewer.

use async_trait::async_trait;
use tracing::debug;

use paperscope_core::render::{PageHandle, PdfRenderer, RenderError, Surface};

use crate::api::ApiClient;

/// US Letter in points.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A parsed document with its page ids in page order.
pub struct LopdfDocument {
    file_id: String,
    inner: lopdf::Document,
    page_ids: Vec<lopdf::ObjectId>,
}

impl LopdfDocument {
    pub fn parse(file_id: &str, bytes: &[u8]) -> Result<Self, RenderError> {
        let inner = lopdf::Document::load_mem(bytes).map_err(|e| RenderError::Load {
            file_id: file_id.to_string(),
            message: e.to_string(),
        })?;
        // get_pages is keyed by 1-based page number
        let page_ids = inner.get_pages().values().copied().collect();
        Ok(Self {
            file_id: file_id.to_string(),
            inner,
            page_ids,
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    /// Page size in points, after rotation.
    pub fn page_size(&self, page_number: u32) -> Result<(f64, f64), RenderError> {
        let page_id = page_number
            .checked_sub(1)
            .and_then(|i| self.page_ids.get(i as usize))
            .copied()
            .ok_or(RenderError::PageOutOfRange {
                page: page_number,
                page_count: self.page_count(),
            })?;

        let render_err = |message: String| RenderError::Render {
            page: page_number,
            message,
        };

        let media_box = match inherited(&self.inner, page_id, b"MediaBox").map_err(render_err)? {
            Some(obj) => number_array(&self.inner, obj).map_err(render_err)?,
            None => DEFAULT_MEDIA_BOX,
        };
        let width = (media_box[2] - media_box[0]).abs();
        let height = (media_box[3] - media_box[1]).abs();

        let rotate = inherited(&self.inner, page_id, b"Rotate")
            .map_err(render_err)?
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        if rotate.rem_euclid(180) == 90 {
            Ok((height, width))
        } else {
            Ok((width, height))
        }
    }
}

/// Look up `key` on a page, walking `/Parent` links up the page tree.
fn inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, String> {
    let mut current = page_id;
    // Bounded so a cyclic /Parent chain cannot hang.
    for _ in 0..64 {
        let dict = doc
            .get_object(current)
            .and_then(|o| o.as_dict())
            .map_err(|e| format!("page dictionary: {}", e))?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(parent) => {
                current = parent
                    .as_reference()
                    .map_err(|e| format!("invalid /Parent: {}", e))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err("page tree too deep".to_string())
}

fn number_array(doc: &lopdf::Document, obj: &lopdf::Object) -> Result<[f64; 4], String> {
    let obj = match obj {
        lopdf::Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| format!("MediaBox reference: {}", e))?,
        other => other,
    };
    let array = obj
        .as_array()
        .map_err(|e| format!("MediaBox is not an array: {}", e))?;
    if array.len() != 4 {
        return Err(format!("MediaBox has {} entries", array.len()));
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(array) {
        *slot = match value {
            lopdf::Object::Integer(i) => *i as f64,
            lopdf::Object::Real(f) => *f as f64,
            other => return Err(format!("expected number, got {:?}", other)),
        };
    }
    Ok(out)
}

/// Renders documents fetched from the analysis backend.
pub struct LopdfRenderer {
    client: ApiClient,
}

impl LopdfRenderer {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PdfRenderer for LopdfRenderer {
    type Document = LopdfDocument;

    async fn load_document(&self, file_id: &str) -> Result<LopdfDocument, RenderError> {
        let bytes = self
            .client
            .fetch_pdf(file_id)
            .await
            .map_err(|e| RenderError::Load {
                file_id: file_id.to_string(),
                message: e.to_string(),
            })?;
        let doc = LopdfDocument::parse(file_id, &bytes)?;
        debug!(file_id, pages = doc.page_count(), "document loaded");
        Ok(doc)
    }

    async fn get_page(
        &self,
        document: &LopdfDocument,
        page_number: u32,
    ) -> Result<PageHandle, RenderError> {
        let (width, height) = document.page_size(page_number)?;
        Ok(PageHandle {
            number: page_number,
            width,
            height,
        })
    }

    async fn render_page_to_surface(
        &self,
        _document: &LopdfDocument,
        page: &PageHandle,
        scale: f64,
    ) -> Result<Surface, RenderError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RenderError::Render {
                page: page.number,
                message: format!("invalid scale {}", scale),
            });
        }
        Ok(page.viewport(scale).surface(page.number))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, ObjectId};

    /// A PDF whose pages have the given MediaBoxes; `None` inherits from
    /// the page tree root, which is A4.
    pub(crate) fn pdf_with_pages(boxes: &[Option<(i64, i64)>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        for size in boxes {
            let page = match size {
                Some((w, h)) => dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), (*w).into(), (*h).into()],
                },
                None => dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                },
            };
            kids.push(doc.add_object(page).into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => boxes.len() as i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_page_size_from_media_box() {
        let doc = LopdfDocument::parse("f1", &pdf_with_pages(&[Some((612, 792)), None])).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_size(1).unwrap(), (612.0, 792.0));
        assert_eq!(doc.page_size(2).unwrap(), (595.0, 842.0));
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = LopdfDocument::parse("f1", &pdf_with_pages(&[Some((612, 792))])).unwrap();
        assert!(matches!(
            doc.page_size(0),
            Err(RenderError::PageOutOfRange { page: 0, page_count: 1 })
        ));
        assert!(matches!(
            doc.page_size(2),
            Err(RenderError::PageOutOfRange { page: 2, page_count: 1 })
        ));
    }

    #[test]
    fn test_garbage_is_load_error() {
        let err = LopdfDocument::parse("f1", b"not a pdf").err().unwrap();
        assert!(matches!(err, RenderError::Load { .. }));
    }

    #[tokio::test]
    async fn test_surface_is_floor_of_scaled_size() {
        let cfg = crate::config::Config::minimal("http://127.0.0.1:9");
        let renderer = LopdfRenderer::new(ApiClient::new(&cfg.backend).unwrap());
        let doc = LopdfDocument::parse("f1", &pdf_with_pages(&[None])).unwrap();

        let page = renderer.get_page(&doc, 1).await.unwrap();
        let surface = renderer.render_page_to_surface(&doc, &page, 1.5).await.unwrap();
        assert_eq!((surface.width, surface.height), (892, 1263));
    }
}
