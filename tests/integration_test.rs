/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use mime_scanner::*;

#[test]
fn test_api() {
    let input = br#"From: Art Vandelay <art@vandelay.com> (Vandelay Industries)
To: "Colleagues": "James Smythe" <james@vandelay.com>; Friends:
    jane@example.com, =?UTF-8?Q?John_Sm=C3=AEth?= <john@example.com>;
Date: Sat, 20 Nov 2021 14:22:01 -0800
Subject: Why not both importing AND exporting? =?utf-8?b?4pi6?=
Content-Type: multipart/mixed; boundary="festivus";

--festivus
Content-Type: text/html; charset="us-ascii"
Content-Transfer-Encoding: base64

PGh0bWw+PHA+SSB3YXMgdGhpbmtpbmcgYWJvdXQgcXVpdHRpbmcgdGhlICZsZHF1bztle
HBvcnRpbmcmcmRxdW87IHRvIGZvY3VzIGp1c3Qgb24gdGhlICZsZHF1bztpbXBvcnRpbm
cmcmRxdW87LDwvcD48cD5idXQgdGhlbiBJIHRob3VnaHQsIHdoeSBub3QgZG8gYm90aD8
gJiN4MjYzQTs8L3A+PC9odG1sPg==
--festivus
Content-Type: message/rfc822

From: "Cosmo Kramer" <kramer@kramerica.com>
Subject: Exporting my book about coffee tables
Content-Type: multipart/mixed; boundary="giddyup";

--giddyup
Content-Type: text/plain; charset="utf-16"
Content-Transfer-Encoding: quoted-printable

=FF=FE=0C!5=D8"=DD5=D8)=DD5=D8-=DD =005=D8*=DD5=D8"=DD =005=D8"=
=DD5=D85=DD5=D8-=DD5=D8,=DD5=D8/=DD5=D81=DD =005=D8*=DD5=D86=DD =
=005=D8=1F=DD5=D8,=DD5=D8,=DD5=D8(=DD =005=D8-=DD5=D8)=DD5=D8"=
=DD5=D8=1E=DD5=D80=DD5=D8"=DD!=00
--giddyup
Content-Type: image/gif; name*1="about "; name*0="Book ";
              name*2*=utf-8''%e2%98%95 tables.gif
Content-Transfer-Encoding: Base64
Content-Disposition: attachment

R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7
--giddyup--
--festivus--
"#;

    let message = from_bytes(input).unwrap();
    assert_eq!(message.to_bytes().unwrap(), input);
    assert_eq!(
        message.subject().unwrap().as_deref(),
        Some("Why not both importing AND exporting? ☺")
    );
    assert_eq!(
        message
            .headers()
            .unwrap()
            .get_addresses("to")
            .unwrap()
            .into_iter()
            .map(|address| address.address)
            .collect::<Vec<_>>(),
        ["james@vandelay.com", "jane@example.com", "john@example.com"]
    );

    let parts = message.parts();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].content_type().value(), "text/html");
    assert!(parts[0]
        .body()
        .unwrap()
        .and_then(Body::as_text)
        .unwrap()
        .starts_with("<html><p>I was thinking about quitting the &ldquo;exporting&rdquo;"));

    let nested = parts[1].enclosed().unwrap();
    assert_eq!(
        nested.subject().unwrap().as_deref(),
        Some("Exporting my book about coffee tables")
    );
    assert_eq!(nested.parts().len(), 2);
    assert!(matches!(
        nested.parts()[0].body().unwrap(),
        Some(Body::Text(text)) if !text.is_empty()
    ));

    let image = &nested.parts()[1];
    assert_eq!(
        image.detected_file_name().unwrap().as_deref(),
        Some("Book about ☕ tables.gif")
    );
    assert!(image.is_attachment().unwrap());
    assert!(image
        .body()
        .unwrap()
        .unwrap()
        .as_bytes()
        .starts_with(b"GIF89a"));

    assert_eq!(message.walk(true, false).count(), 6);
    assert_eq!(message.walk(false, true).count(), 2);
    assert!(!message.was_changed());
}

const NESTED: &str = concat!(
    "From: =?utf-8?B?0JbQtdC60LA=?= <ev@host.com>\r\n",
    "Subject: nested\r\n",
    "Content-Type: multipart/mixed; boundary=bd1\r\n",
    "\r\n",
    "--bd1\r\n",
    "Content-Type: text/plain\r\n",
    "\r\n",
    "Sasha\r\n",
    "\r\n",
    "--bd1\r\n",
    "Content-Type: multipart/alternative; boundary=bd2\r\n",
    "\r\n",
    "--bd2\r\n",
    "Content-Type: text/plain\r\n",
    "\r\n",
    "plain\r\n",
    "--bd2\r\n",
    "Content-Type: text/html\r\n",
    "\r\n",
    "<b>html</b>\r\n",
    "--bd2--\r\n",
    "\r\n",
    "--bd1--\r\n"
);

#[test]
fn scan_nested_tree() {
    let message = from_bytes(NESTED.as_bytes()).unwrap();

    assert_eq!(message.parts().len(), 2);
    assert_eq!(
        message.parts()[0].body().unwrap(),
        Some(&Body::Text("Sasha\r\n".into()))
    );
    let alternative = &message.parts()[1];
    assert_eq!(alternative.parts()[0].content_type().value(), "text/plain");
    assert_eq!(alternative.parts()[1].content_type().value(), "text/html");
    assert_eq!(message.to_bytes().unwrap(), NESTED.as_bytes());
    assert_eq!(message.size().unwrap(), NESTED.len());
}

#[test]
fn mutation_isolation() {
    let mut message = from_bytes(NESTED.as_bytes()).unwrap();
    message.parts_mut()[0].set_body("Hey!\n");

    let output = message.to_string().unwrap();
    assert_ne!(output, NESTED);

    let tail = |text: &str| {
        let start = text.match_indices("--bd1\r\n").nth(1).unwrap().0;
        let end = text.find("--bd1--").unwrap();
        text[start..end].to_string()
    };
    assert_eq!(tail(&output), tail(NESTED));
    assert!(output.starts_with(&NESTED[..NESTED.find("Sasha").unwrap()]));
    assert_eq!(
        from_bytes(output.as_bytes()).unwrap().parts()[0]
            .body()
            .unwrap()
            .and_then(Body::as_text),
        Some("Hey!\r\n")
    );
}

#[test]
fn encoded_word_headers() {
    let mut message = from_bytes(NESTED.as_bytes()).unwrap();
    let from = message.headers().unwrap().get_text("From").unwrap();
    assert_eq!(from, "Жека <ev@host.com>");

    message.headers_mut().unwrap().set("From", &from);
    let output = message.to_bytes().unwrap();
    let reparsed = from_bytes(&output).unwrap();
    let headers = reparsed.headers().unwrap();

    assert!(headers.get_raw("From").unwrap().is_ascii());
    assert_eq!(headers.get_text("From").unwrap(), from);
    assert_eq!(
        headers.get_addresses("From").unwrap(),
        [Address {
            name: Some("Жека".into()),
            address: "ev@host.com".into()
        }]
    );
}

#[test]
fn rfc2231_continuations() {
    let input = concat!(
        "Content-Type: application/octet-stream\r\n",
        "Content-Disposition: attachment; filename*0*=us-ascii'en'This%20is%20; filename*1*=fun\r\n",
        "\r\n",
        "data"
    );
    let message = from_bytes(input.as_bytes()).unwrap();
    let (disposition, params) = message.content_disposition().unwrap();

    assert_eq!(disposition.as_deref(), Some("attachment"));
    assert_eq!(
        params.iter().collect::<Vec<_>>(),
        [("filename", "This is fun")]
    );
    assert_eq!(
        message.detected_file_name().unwrap().as_deref(),
        Some("This is fun")
    );
}

#[test]
fn threading_with_gap() {
    let inputs = [
        "Message-ID: <a@x>\r\nSubject: start\r\n\r\n",
        "Message-ID: <b@x>\r\nReferences: <a@x>\r\nSubject: Re: start\r\n\r\n",
        "Message-ID: <d@x>\r\nReferences: <a@x> <b@x> <c@x>\r\nSubject: Re: Re: start\r\n\r\n",
    ];
    let messages = inputs
        .iter()
        .map(|input| from_bytes(input.as_bytes()).unwrap())
        .collect::<Vec<_>>();
    let tree = build_thread(&messages);

    let a = tree.find("a@x").unwrap();
    let b = tree.find("b@x").unwrap();
    let c = tree.find("c@x").unwrap();
    let d = tree.find("d@x").unwrap();

    assert_eq!(tree.roots(), [a]);
    assert_eq!(tree.children(a), [b]);
    assert_eq!(tree.children(b), [c]);
    assert_eq!(tree.children(c), [d]);
    assert!(tree.get(c).unwrap().message.is_none());

    for (_, id) in tree.walk() {
        if let Some(message) = tree.get(id).unwrap().message {
            assert_eq!(message.clean_subject().unwrap().as_deref(), Some("start"));
        }
    }
}

#[test]
fn bounce_classification() {
    let report = concat!(
        "Content-Type: multipart/report; report-type=delivery-status; boundary=rpt\r\n",
        "\r\n",
        "--rpt\r\n",
        "Content-Type: message/delivery-status\r\n",
        "\r\n",
        "Reporting-MTA: dns; mx.example.com\r\n",
        "\r\n",
        "Final-Recipient: rfc822; nobody@example.com\r\n",
        "Action: failed\r\n",
        "Status: 5.1.1\r\n",
        "Diagnostic-Code: smtp; 550 no such user\r\n",
        "\r\n",
        "--rpt--\r\n"
    );
    let message = from_bytes(report.as_bytes()).unwrap();
    assert!(message.is_bounce());
    assert_eq!(message.bounce().status.as_deref(), Some("5.1.1"));
    assert!(message.get_attached_message().is_none());

    let with_original = report.replace(
        "--rpt--\r\n",
        concat!(
            "--rpt\r\n",
            "Content-Type: message/rfc822\r\n",
            "\r\n",
            "Message-ID: <orig@example.com>\r\n",
            "\r\n",
            "original\r\n",
            "--rpt--\r\n"
        ),
    );
    let message = from_bytes(with_original.as_bytes()).unwrap();
    assert!(message.is_bounce());
    assert_eq!(
        message
            .get_attached_message()
            .unwrap()
            .message_id()
            .unwrap()
            .as_deref(),
        Some("orig@example.com")
    );
}

#[test]
fn header_line_limits() {
    for (len, is_ok) in [(10_000, true), (10_001, false)] {
        let input = format!("X-Long: {}\r\n\r\nbody", "a".repeat(len - 8));
        let result = from_bytes(input.as_bytes());
        assert_eq!(result.is_ok(), is_ok, "Failed for {len}");
        if let Err(err) = result {
            assert!(matches!(err, Error::MalformedHeaders(_)));
            assert!(err.is_decoding_error());
        }
        assert!(recover_from_bytes(input.as_bytes()).is_ok(), "Failed for {len}");
    }

    // Content-Type lines and folded continuation lines are held to the same limit.
    for (len, is_ok) in [(10_000, true), (10_001, false)] {
        for input in [
            format!(
                "Content-Type: text/plain; x={}\r\n\r\nbody",
                "a".repeat(len - "Content-Type: text/plain; x=".len())
            ),
            format!(
                "Content-Type: text/plain;\r\n x={}\r\n\r\nbody",
                "a".repeat(len - " x=".len())
            ),
            format!("Subject: a\r\n {}\r\n\r\nbody", "b".repeat(len - 1)),
        ] {
            match from_bytes(input.as_bytes()) {
                Ok(message) => {
                    assert!(is_ok, "Failed for {len}: {input:.40}");
                    assert!(message.headers().is_ok(), "Failed for {len}: {input:.40}");
                }
                Err(err) => {
                    assert!(!is_ok, "Failed for {len}: {input:.40}");
                    assert!(matches!(err, Error::MalformedHeaders(_)));
                }
            }
            assert!(recover_from_bytes(input.as_bytes()).is_ok(), "Failed for {len}");
        }
    }

    let input = format!("X-Long: {}\r\n\r\nbody", "a".repeat(200));
    assert!(MessageParser::new()
        .with_max_header_line(100)
        .parse(input.as_bytes())
        .is_err());
}

#[test]
fn quoted_printable_line_limit() {
    let mut part = text("plain", "", Some("iso-8859-1"), None, None);
    part.set_body(format!("{}\n{}", "é".repeat(300), "x ".repeat(400)));

    let output = part.to_bytes().unwrap();
    let reparsed = from_bytes(&output).unwrap();
    assert_eq!(
        reparsed
            .headers()
            .unwrap()
            .get_raw("Content-Transfer-Encoding"),
        Some("quoted-printable")
    );
    for line in output.split(|&ch| ch == b'\n') {
        assert!(line.len() <= 77, "Line too long: {:?}", String::from_utf8_lossy(line));
    }
    assert_eq!(
        reparsed.body().unwrap().and_then(Body::as_text),
        Some(format!("{}\r\n{}", "é".repeat(300), "x ".repeat(400)).as_str())
    );
}

#[test]
fn long_line_threshold() {
    for (len, expected) in [(598, None), (599, Some("quoted-printable"))] {
        let mut part = text("plain", "", Some("us-ascii"), None, None);
        part.set_body("w".repeat(len));
        let reparsed_bytes = part.to_bytes().unwrap();
        let reparsed = from_bytes(&reparsed_bytes).unwrap();
        assert_eq!(
            reparsed
                .headers()
                .unwrap()
                .get_raw("Content-Transfer-Encoding"),
            expected,
            "Failed for {len}"
        );
    }

    let mut part = text("plain", "", Some("us-ascii"), None, None);
    part.set_body("w".repeat(700));
    let config = EncoderConfig::new().with_long_line_threshold(1000);
    let mut output = Vec::new();
    part.to_stream_with(&mut output, &config).unwrap();
    assert_eq!(part.size_with(&config).unwrap(), output.len());
    assert!(!String::from_utf8(output).unwrap().contains("quoted-printable"));
}

#[test]
fn structural_idempotence() {
    let mut message = from_bytes(NESTED.as_bytes()).unwrap();
    message.parts_mut()[1].parts_mut()[1].set_body("<i>changed</i>");

    let first = message.to_bytes().unwrap();
    let second = from_bytes(&first).unwrap().to_bytes().unwrap();
    assert_eq!(first, second);

    let reparsed = from_bytes(&second).unwrap();
    assert_eq!(
        reparsed
            .walk(true, false)
            .map(|part| part.content_type().value())
            .collect::<Vec<_>>(),
        [
            "multipart/mixed",
            "text/plain",
            "multipart/alternative",
            "text/plain",
            "text/html"
        ]
    );
}

#[test]
fn serde_output() {
    let message = from_bytes(NESTED.as_bytes()).unwrap();
    let headers = message.headers().unwrap();

    let json = serde_json::to_value(headers).unwrap();
    assert_eq!(
        json["entries"][1],
        serde_json::json!(["Subject", "nested"])
    );
    let decoded: MimeHeaders = serde_json::from_value(json).unwrap();
    assert_eq!(decoded.get_raw("subject"), Some("nested"));

    assert_eq!(
        serde_json::to_string(&message.content_type().into_owned()).unwrap(),
        r#"{"main":"multipart","sub":"mixed","params":[["boundary","bd1"]]}"#
    );
    assert_eq!(
        serde_json::to_string(message.parts()[0].body().unwrap().unwrap()).unwrap(),
        r#"{"Text":"Sasha\r\n"}"#
    );
    assert_eq!(
        serde_json::to_value(message.bounce()).unwrap()["score"],
        serde_json::json!(0.0)
    );
}
