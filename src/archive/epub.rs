use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::{
    ArchiveBuilder, create_archive_file, escape_xml, finish_archive, map_page, remove_partial,
    write_entry,
};
use crate::error::{Error, Result};
use crate::types::{EbookMetadata, PageFile, PageNaming};

const MIMETYPE: &[u8] = b"application/epub+zip";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>
"#;

/// One page as referenced from the manifest and spine.
#[derive(Debug, Clone, PartialEq)]
struct PackagePage {
    /// `page_001`; doubles as the markup item id.
    stem: String,
    /// `page_001.jpg`
    image_name: String,
}

impl PackagePage {
    fn from_page_file(page: &PageFile) -> Self {
        let image_name = page.file_name();
        let stem = Path::new(&image_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| PageNaming::default().stem(page.index));
        Self { stem, image_name }
    }

    fn image_id(&self) -> String {
        self.stem.replacen("page_", "img_", 1)
    }

    fn markup_href(&self) -> String {
        format!("pages/{}.xhtml", self.stem)
    }
}

/// Generates the XHTML wrapper for a single page image.
fn page_xhtml(page_number: usize, image_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
    <title>Page {number}</title>
    <style type="text/css">
        body {{ margin: 0; padding: 0; text-align: center; }}
        img {{ max-width: 100%; max-height: 100%; }}
    </style>
</head>
<body>
    <img src="../images/{src}" alt="Page {number}"/>
</body>
</html>
"#,
        number = page_number,
        src = escape_xml(image_name),
    )
}

/// Generates `content.opf`: metadata, one `{page, image}` item pair per page
/// and one spine `itemref` per page, in page order.
fn content_opf(metadata: &EbookMetadata, pages: &[PackagePage]) -> String {
    let identifier = escape_xml(metadata.identifier.as_deref().unwrap_or_default());

    let mut manifest = String::new();
    let mut spine = String::new();
    for page in pages {
        manifest.push_str(&format!(
            "        <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            page.stem,
            page.markup_href()
        ));
        manifest.push_str(&format!(
            "        <item id=\"{}\" href=\"images/{}\" media-type=\"image/jpeg\"/>\n",
            page.image_id(),
            escape_xml(&page.image_name)
        ));
        spine.push_str(&format!("        <itemref idref=\"{}\"/>\n", page.stem));
    }

    let cover = pages
        .first()
        .map(|p| format!("        <meta name=\"cover\" content=\"{}\"/>\n", p.image_id()))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId" version="2.0">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>{title}</dc:title>
        <dc:creator>{creator}</dc:creator>
        <dc:identifier id="BookId">{identifier}</dc:identifier>
        <dc:language>{language}</dc:language>
{cover}    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
{manifest}    </manifest>
    <spine toc="ncx">
{spine}    </spine>
</package>
"#,
        title = escape_xml(&metadata.title),
        creator = escape_xml(&metadata.creator),
        identifier = identifier,
        language = escape_xml(&metadata.language),
        cover = cover,
        manifest = manifest,
        spine = spine,
    )
}

/// Generates `toc.ncx` with a single navigation point at the first page.
fn toc_ncx(metadata: &EbookMetadata, pages: &[PackagePage]) -> String {
    // An empty book still needs one navPoint; point it where page 1 would be.
    let first_href = pages
        .first()
        .map(PackagePage::markup_href)
        .unwrap_or_else(|| format!("pages/{}", PageNaming::default().markup_name(1)));

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <head>
        <meta name="dtb:uid" content="{identifier}"/>
        <meta name="dtb:depth" content="1"/>
        <meta name="dtb:totalPageCount" content="0"/>
        <meta name="dtb:maxPageNumber" content="0"/>
    </head>
    <docTitle>
        <text>{title}</text>
    </docTitle>
    <navMap>
        <navPoint id="navpoint-1" playOrder="1">
            <navLabel>
                <text>Start</text>
            </navLabel>
            <content src="{href}"/>
        </navPoint>
    </navMap>
</ncx>
"#,
        identifier = escape_xml(metadata.identifier.as_deref().unwrap_or_default()),
        title = escape_xml(&metadata.title),
        href = first_href,
    )
}

/// A builder for EPUB packages with one image per page.
///
/// Entry order: `mimetype` (stored), `META-INF/container.xml`, then for each
/// page `OEBPS/images/page_NNN.jpg` and `OEBPS/pages/page_NNN.xhtml`, and
/// finally `OEBPS/content.opf` and `OEBPS/toc.ncx`. Everything after
/// `mimetype` is deflated.
pub struct EbookPackage {
    zip: Option<ZipWriter<File>>,
    deflated: SimpleFileOptions,
    output_path: PathBuf,
    metadata: EbookMetadata,
    pages: Vec<PackagePage>,
}

impl EbookPackage {
    async fn write_deflated<C>(&mut self, name: String, content: C) -> Result<()>
    where
        C: AsRef<[u8]> + Send + 'static,
    {
        write_entry(&mut self.zip, name, self.deflated, content).await
    }
}

#[async_trait]
impl ArchiveBuilder for EbookPackage {
    fn new(output_path: &Path) -> Result<Self> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let file = create_archive_file(output_path)?;
        let mut zip = ZipWriter::new(file);

        // Must be the first entry, uncompressed
        zip.start_file("mimetype", stored)
            .map_err(|e| Error::structural("Cannot write mimetype entry", e))?;
        zip.write_all(MIMETYPE)
            .map_err(|e| Error::structural("Cannot write mimetype entry", e))?;
        zip.start_file("META-INF/container.xml", deflated)
            .map_err(|e| Error::structural("Cannot write container entry", e))?;
        zip.write_all(CONTAINER_XML.as_bytes())
            .map_err(|e| Error::structural("Cannot write container entry", e))?;

        Ok(EbookPackage {
            zip: Some(zip),
            deflated,
            output_path: output_path.to_path_buf(),
            metadata: EbookMetadata::default_with_title(String::new()),
            pages: Vec::new(),
        })
    }

    async fn add_page(&mut self, page: &PageFile) -> Result<&mut Self> {
        let mmap = map_page(page).await?;
        let package_page = PackagePage::from_page_file(page);

        self.write_deflated(format!("OEBPS/images/{}", package_page.image_name), mmap)
            .await?;
        let markup = page_xhtml(page.index, &package_page.image_name);
        self.write_deflated(format!("OEBPS/{}", package_page.markup_href()), markup)
            .await?;

        self.pages.push(package_page);
        Ok(self)
    }

    async fn set_metadata(&mut self, metadata: &EbookMetadata) -> Result<&mut Self> {
        self.metadata = metadata.clone();
        Ok(self)
    }

    async fn save(mut self) -> Result<PathBuf> {
        let opf = content_opf(&self.metadata, &self.pages);
        let ncx = toc_ncx(&self.metadata, &self.pages);
        self.write_deflated("OEBPS/content.opf".to_string(), opf).await?;
        self.write_deflated("OEBPS/toc.ncx".to_string(), ncx).await?;

        finish_archive(&mut self.zip, "Cannot finalize EPUB package").await?;
        Ok(self.output_path)
    }

    fn discard(mut self) -> Result<()> {
        drop(self.zip.take());
        remove_partial(&self.output_path)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(indices: &[usize]) -> Vec<PackagePage> {
        let naming = PageNaming::default();
        indices
            .iter()
            .map(|&i| {
                PackagePage::from_page_file(&PageFile {
                    index: i,
                    path: PathBuf::from(format!("/work/pages/{}", naming.image_name(i))),
                })
            })
            .collect()
    }

    fn metadata() -> EbookMetadata {
        EbookMetadata::default_with_title("Tom & Jerry".to_string()).resolved("tom")
    }

    #[test]
    fn test_package_page_ids() {
        let page = &pages(&[3])[0];
        assert_eq!(page.stem, "page_003");
        assert_eq!(page.image_id(), "img_003");
        assert_eq!(page.markup_href(), "pages/page_003.xhtml");
    }

    #[test]
    fn test_content_opf_lists_pages_in_order() {
        let opf = content_opf(&metadata(), &pages(&[1, 2, 4]));

        assert!(opf.contains("<dc:title>Tom &amp; Jerry</dc:title>"));
        assert!(opf.contains(r#"<meta name="cover" content="img_001"/>"#));
        assert!(opf.contains(
            r#"<item id="page_004" href="pages/page_004.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        assert!(opf.contains(
            r#"<item id="img_002" href="images/page_002.jpg" media-type="image/jpeg"/>"#
        ));

        let p1 = opf.find(r#"<itemref idref="page_001"/>"#).unwrap();
        let p2 = opf.find(r#"<itemref idref="page_002"/>"#).unwrap();
        let p4 = opf.find(r#"<itemref idref="page_004"/>"#).unwrap();
        assert!(p1 < p2 && p2 < p4);
        assert!(!opf.contains("page_003"));
    }

    #[test]
    fn test_content_opf_is_deterministic() {
        let a = content_opf(&metadata(), &pages(&[1, 2]));
        let b = content_opf(&metadata(), &pages(&[1, 2]));
        assert_eq!(a, b);
        assert_eq!(toc_ncx(&metadata(), &pages(&[1, 2])), toc_ncx(&metadata(), &pages(&[1, 2])));
    }

    #[test]
    fn test_toc_points_at_first_page() {
        let ncx = toc_ncx(&metadata(), &pages(&[2, 3]));
        assert!(ncx.contains(r#"<content src="pages/page_002.xhtml"/>"#));
        assert_eq!(ncx.matches("<navPoint ").count(), 1);

        let empty = toc_ncx(&metadata(), &[]);
        assert!(empty.contains(r#"<content src="pages/page_001.xhtml"/>"#));
    }

    #[test]
    fn test_page_markup_references_image() {
        let xhtml = page_xhtml(5, "page_005.jpg");
        assert!(xhtml.contains(r#"<img src="../images/page_005.jpg" alt="Page 5"/>"#));
        assert!(xhtml.contains("<title>Page 5</title>"));
    }
}
