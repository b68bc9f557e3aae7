//! Files and download responses as write destinations.

mod common;

use std::fs;
use std::io::{Cursor, Read, Write};

use common::{li, ymd, Person};
use pretty_assertions::assert_eq;
use rowbind::{
    BufferedResponse, DownloadResponse, MapError, RowMapper, XlsReader, DOWNLOAD_CONTENT_TYPE,
};

const SPEC: [Option<&str>; 2] = [Some("name"), Some("birth_date")];
const TITLES: [&str; 2] = ["Name", "BirthDate"];

fn wang() -> Person {
    Person {
        name: "Wang".into(),
        birth_date: ymd(1988, 8, 8),
    }
}

#[test]
fn write_file_creates_a_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xls");
    let mapper = RowMapper::new(&path);

    mapper.write_file(&[li(), wang()], &SPEC, &TITLES, "People").unwrap();

    assert_eq!(mapper.sheet_names().unwrap(), vec!["People"]);
    let people: Vec<Person> = mapper.read(&SPEC, 0, true).unwrap();
    assert_eq!(people, vec![li(), wang()]);
}

#[test]
fn write_file_appends_to_existing_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xls");
    let mapper = RowMapper::new(&path);

    mapper.write_file(&[li()], &SPEC, &TITLES, "2020").unwrap();
    mapper.write_file(&[wang()], &SPEC, &TITLES, "1988").unwrap();

    assert_eq!(mapper.sheet_names().unwrap(), vec!["2020", "1988"]);
    let first: Vec<Person> = mapper.read(&SPEC, 0, true).unwrap();
    let second: Vec<Person> = mapper.read(&SPEC, 1, true).unwrap();
    assert_eq!(first, vec![li()]);
    assert_eq!(second, vec![wang()]);
}

#[test]
fn write_file_rejects_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xls");
    let stale = vec![0xAB; 200_000];
    fs::write(&path, &stale).unwrap();

    // not a workbook: the append path refuses it and leaves it alone
    let mapper = RowMapper::new(&path);
    let err = mapper.write_file(&[li()], &SPEC, &TITLES, "People").unwrap_err();
    assert!(matches!(err, MapError::Open { .. }));
    assert_eq!(fs::read(&path).unwrap(), stale);

    // an empty file is treated as absent
    fs::write(&path, b"").unwrap();
    mapper.write_file(&[li()], &SPEC, &TITLES, "People").unwrap();
    assert!(fs::metadata(&path).unwrap().len() > 0);
    assert_eq!(
        mapper.read::<Person, _>(&SPEC, 0, true).unwrap(),
        vec![li()]
    );
}

#[test]
fn write_file_keeps_other_streams() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xls");

    let mut bytes = Vec::new();
    RowMapper::detached()
        .write_to(&[li()], &SPEC, &TITLES, "Old", &mut bytes)
        .unwrap();
    let mut cfb = cfb::CompoundFile::open(Cursor::new(bytes)).unwrap();
    let summary: Vec<u8> = (0..3000u32).map(|i| (i % 97) as u8).collect();
    cfb.create_stream("/\u{5}SummaryInformation")
        .unwrap()
        .write_all(&summary)
        .unwrap();
    cfb.flush().unwrap();
    fs::write(&path, cfb.into_inner().into_inner()).unwrap();

    let mapper = RowMapper::new(&path);
    mapper.write_file(&[wang()], &SPEC, &TITLES, "New").unwrap();

    let mut cfb = cfb::CompoundFile::open(fs::File::open(&path).unwrap()).unwrap();
    let mut kept = Vec::new();
    cfb.open_stream("/\u{5}SummaryInformation")
        .unwrap()
        .read_to_end(&mut kept)
        .unwrap();
    assert_eq!(kept, summary);

    assert_eq!(mapper.sheet_names().unwrap(), vec!["Old", "New"]);
    let old: Vec<Person> = mapper.read(&SPEC, 0, true).unwrap();
    let new: Vec<Person> = mapper.read(&SPEC, 1, true).unwrap();
    assert_eq!(old, vec![li()]);
    assert_eq!(new, vec![wang()]);
}

#[test]
fn duplicate_sheet_name_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xls");
    let mapper = RowMapper::new(&path);
    mapper.write_file(&[li()], &SPEC, &TITLES, "People").unwrap();
    let before = fs::read(&path).unwrap();

    let err = mapper
        .write_file(&[wang()], &SPEC, &TITLES, "people")
        .unwrap_err();
    assert!(matches!(err, MapError::Core(_)));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn read_of_missing_file_names_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nowhere.xls");
    let err = RowMapper::new(&path)
        .read::<Person, _>(&SPEC, 0, true)
        .unwrap_err();
    assert!(matches!(err, MapError::Open { .. }));
    assert!(err.to_string().contains("nowhere.xls"));
}

#[test]
fn read_rows_returns_cell_texts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xls");
    let mapper = RowMapper::new(&path);
    mapper
        .write_file(&[li()], &[Some("name"), None, Some("birth_date")], &TITLES, "People")
        .unwrap();

    let rows = mapper.read_rows(0, false).unwrap();
    assert_eq!(
        rows,
        vec![
            (0, vec![Some("Name".to_string()), Some("BirthDate".to_string())]),
            (1, vec![Some("Li".to_string()), Some("2020-01-01".to_string())]),
        ]
    );
    assert_eq!(mapper.read_rows(0, true).unwrap().len(), 1);
}

#[test]
fn download_sets_headers_and_body() {
    let mut response = BufferedResponse::new();
    response.set_header("X-Stale", "yes").unwrap();
    response.body().write_all(b"partial page").unwrap();

    RowMapper::detached()
        .write_download(
            &mut response,
            "人员 名单.xls",
            &[li()],
            &SPEC,
            &TITLES,
            "People",
        )
        .unwrap();

    assert_eq!(response.header("X-Stale"), None);
    assert_eq!(response.header("Content-Type"), Some(DOWNLOAD_CONTENT_TYPE));
    assert_eq!(
        response.header("Content-Disposition"),
        Some("attachment; filename=%E4%BA%BA%E5%91%98+%E5%90%8D%E5%8D%95.xls")
    );

    let workbook = XlsReader::read(Cursor::new(response.into_body())).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["People"]);
    assert_eq!(
        workbook.worksheet(0).unwrap().cell_text(1, 0, false).as_deref(),
        Some("Li")
    );
}

#[test]
fn failed_download_leaves_response_alone() {
    let mut response = BufferedResponse::new();
    response.set_header("X-Keep", "1").unwrap();

    let err = RowMapper::detached()
        .write_download(&mut response, "x.xls", &[li()], &SPEC, &["Only one"], "S")
        .unwrap_err();
    assert!(matches!(err, MapError::TitleMismatch { .. }));
    assert_eq!(response.header("X-Keep"), Some("1"));
}

#[cfg(feature = "http")]
#[test]
fn download_into_http_response() {
    let mut response = http::Response::new(Vec::new());
    RowMapper::detached()
        .write_download(&mut response, "people.xls", &[li()], &SPEC, &TITLES, "People")
        .unwrap();

    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=people.xls"
    );
    let people: Vec<Person> = RowMapper::detached()
        .read_from(Cursor::new(response.into_body()), &SPEC, 0, true)
        .unwrap();
    assert_eq!(people, vec![li()]);
}
