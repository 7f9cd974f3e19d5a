use std::any::type_name;
use std::fmt::Debug;
use std::io;

use codeq::Decode;
use codeq::Encode;

use crate::Record;

/// Check that `v` encodes to exactly `encoded_bytes` and decodes back.
#[allow(dead_code)]
pub fn test_codec_without_corruption<D: Encode + Decode + PartialEq + Debug>(
    encoded_bytes: &[u8],
    v: &D,
) -> Result<(), io::Error> {
    let mes = format!(
        "Type: {} encoded data: {:?}",
        type_name::<D>(),
        encoded_bytes
    );

    {
        let mut b = Vec::new();
        let n = v.encode(&mut b)?;
        assert_eq!(n, b.len(), "output len, {}", &mes);
        assert_eq!(b, encoded_bytes, "output data, {}", &mes);
    }

    {
        let b = encoded_bytes.to_vec();
        let decoded = D::decode(&mut b.as_slice())?;
        assert_eq!(v, &decoded, "decode, {}", &mes);
    }

    Ok(())
}

/// Build a record with a string value.
#[allow(dead_code)]
pub(crate) fn rec(x: impl ToString) -> Record {
    Record::new(x.to_string().into_bytes())
}

/// Encode a record into the bytes a store frame carries.
#[allow(dead_code)]
pub(crate) fn encode_record(offset: u64, value: &[u8]) -> Vec<u8> {
    let r = Record {
        offset,
        value: value.to_vec(),
    };
    let mut b = Vec::new();
    r.encode(&mut b).unwrap();
    b
}
