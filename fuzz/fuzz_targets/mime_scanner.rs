#![no_main]
use libfuzzer_sys::fuzz_target;

use mime_scanner::{
    decoders::{
        base64::{decode_base64, decode_base64_word},
        charsets::{
            decode_charset,
            detect::detect,
            utf::{decoder_utf16, decoder_utf16_be, decoder_utf16_le, decoder_utf7},
        },
        encoded_word::decode_header,
        hex::decode_hex,
        quoted_printable::{decode_quoted_printable, decode_quoted_printable_word},
    },
    encoders::{
        encoded_word::{encode_unstructured, MAX_WORD_LENGTH},
        quoted_printable::encode_quoted_printable,
    },
    parsers::{
        fields::{
            address::{parse_address_groups, parse_address_list},
            id::parse_ids, params::parse_parameterized,
            thread::clean_subject,
        },
        header::parse_headers,
        tokenizer::tokenize,
        MessageStream,
    },
    MessageParser,
};

static RFC822_ALPHABET: &[u8] = b"0123456789abcdefghijklm:=-; \r\n";

fuzz_target!(|data: &[u8]| {
    for data_ in [
        std::borrow::Cow::from(data),
        std::borrow::Cow::from(into_alphabet(data, RFC822_ALPHABET)),
    ] {
        let data = data_.as_ref();

        // Field parsers
        let str_data = String::from_utf8_lossy(data);
        parse_address_list(&str_data);
        parse_address_groups(&str_data);
        parse_ids(&str_data);
        parse_parameterized(&str_data);
        clean_subject(&str_data);
        decode_header(&str_data);
        encode_unstructured(&str_data, MAX_WORD_LENGTH);
        let _ = parse_headers(&mut MessageStream::new(data), 10_000, true);

        // Decoders
        decode_base64(data);
        decode_base64_word(data);
        decode_quoted_printable(data);
        decode_quoted_printable_word(data);
        decode_hex(data);
        detect(data);
        let _ = decode_charset(&str_data, data);
        encode_quoted_printable(data, 76);

        for decoder in &[decoder_utf7, decoder_utf16_le, decoder_utf16_be, decoder_utf16]
            as &[for<'x> fn(&'x [u8]) -> String]
        {
            decoder(data);
        }

        // Scanner and serializer
        for parser in [MessageParser::new(), MessageParser::new().lenient()] {
            let _ = tokenize(data, &parser);
            if let Ok(message) = parser.parse(data) {
                for part in message.walk(true, false) {
                    let _ = part.body();
                    let _ = part.detected_content_type();
                }
                let _ = message.bounce();
                assert_eq!(message.to_bytes().ok().as_deref(), Some(data));

                let mut message = message;
                if let Ok(headers) = message.headers_mut() {
                    headers.add("X-Fuzz", "1");
                }
                let _ = message.to_bytes();
            }
        }
    }
});

fn into_alphabet(data: &[u8], alphabet: &[u8]) -> Vec<u8> {
    data.iter()
        .map(|&byte| alphabet[byte as usize % alphabet.len()])
        .collect()
}
