//! Builders and fixtures for integration tests.
//!
//! Directory records, job requests and fixture PDFs without repeating
//! every field in each test.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use contractflow::db::directory_repo::{PropertyRow, UserRow, VendorRow};
use contractflow::NewJob;

const CREATED_AT: &str = "2026-01-01T00:00:00+00:00";

/// Builder for client/owner `UserRow`s.
pub struct UserBuilder {
    row: UserRow,
}

impl UserBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            row: UserRow {
                id: id.to_string(),
                name: format!("User {}", id),
                email: None,
                phone: None,
                created_at: CREATED_AT.to_string(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.row.name = name.to_string();
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.row.email = Some(email.to_string());
        self
    }

    pub fn phone(mut self, phone: &str) -> Self {
        self.row.phone = Some(phone.to_string());
        self
    }

    pub fn build(self) -> UserRow {
        self.row
    }
}

/// Builder for `VendorRow`s.
pub struct VendorBuilder {
    row: VendorRow,
}

impl VendorBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            row: VendorRow {
                id: id.to_string(),
                name: format!("Vendor {}", id),
                email: None,
                phone: None,
                address: None,
                service_type: None,
                created_at: CREATED_AT.to_string(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.row.name = name.to_string();
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.row.email = Some(email.to_string());
        self
    }

    pub fn address(mut self, address: &str) -> Self {
        self.row.address = Some(address.to_string());
        self
    }

    pub fn service_type(mut self, service_type: &str) -> Self {
        self.row.service_type = Some(service_type.to_string());
        self
    }

    pub fn build(self) -> VendorRow {
        self.row
    }
}

/// Builder for `PropertyRow`s.
pub struct PropertyBuilder {
    row: PropertyRow,
}

impl PropertyBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            row: PropertyRow {
                id: id.to_string(),
                owner_id: None,
                name: format!("Property {}", id),
                address: None,
                created_at: CREATED_AT.to_string(),
            },
        }
    }

    pub fn owner(mut self, owner_id: &str) -> Self {
        self.row.owner_id = Some(owner_id.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.row.name = name.to_string();
        self
    }

    pub fn address(mut self, address: &str) -> Self {
        self.row.address = Some(address.to_string());
        self
    }

    pub fn build(self) -> PropertyRow {
        self.row
    }
}

/// Builder for `NewJob` requests.
pub struct JobRequestBuilder {
    request: NewJob,
}

impl JobRequestBuilder {
    pub fn new(property_id: &str, client_id: &str) -> Self {
        Self {
            request: NewJob {
                property_id: property_id.to_string(),
                client_id: client_id.to_string(),
                request_details: "Inspect and repair the roof".to_string(),
                service_type: "Roofing".to_string(),
                vendor_id: None,
            },
        }
    }

    pub fn request_details(mut self, details: &str) -> Self {
        self.request.request_details = details.to_string();
        self
    }

    pub fn service_type(mut self, service_type: &str) -> Self {
        self.request.service_type = service_type.to_string();
        self
    }

    pub fn vendor(mut self, vendor_id: &str) -> Self {
        self.request.vendor_id = Some(vendor_id.to_string());
        self
    }

    pub fn build(self) -> NewJob {
        self.request
    }
}

/// A PDF with one page per label, each page showing its label.
pub fn labelled_pdf(labels: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*label)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("Failed to encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => labels.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to save fixture PDF");
    bytes
}

/// A fixture scope-of-work PDF with `pages` pages labelled `sow-1`, `sow-2`, ...
pub fn scope_of_work_pdf(pages: usize) -> Vec<u8> {
    let labels: Vec<String> = (1..=pages).map(|i| format!("sow-{}", i)).collect();
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    labelled_pdf(&refs)
}

/// Page count of a PDF on disk.
pub fn pdf_page_count(path: &std::path::Path) -> usize {
    Document::load(path)
        .expect("Failed to load PDF")
        .get_pages()
        .len()
}

/// Text of the first `Tj` operator on each page, in page order.
pub fn pdf_page_labels(path: &std::path::Path) -> Vec<String> {
    let doc = Document::load(path).expect("Failed to load PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let content = doc.get_page_content(id).expect("Failed to read page content");
            let content = Content::decode(&content).expect("Failed to decode content");
            content
                .operations
                .iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| op.operands.first())
                .and_then(|o| o.as_str().ok())
                .map(|s| String::from_utf8_lossy(s).to_string())
                .unwrap_or_default()
        })
        .collect()
}
