//! Transaction types: output references, outputs, and the signed transaction
use crate::error::ChainError;
use crate::transaction::codec;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;

/// Value carried by an output.
///
/// Holds exactly the float64 that travels on the wire. Its JSON text is the
/// one Go's `encoding/json` writes for the same value, so canonical bytes and
/// ids agree with Go signers bit for bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Amount(f64);

impl Amount {
    pub const ZERO: Amount = Amount(0.0);

    pub const fn new(value: f64) -> Self {
        Amount(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Sum, or `None` when it leaves the finite range.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        let sum = self.0 + rhs.0;
        sum.is_finite().then_some(Amount(sum))
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        let difference = self.0 - rhs.0;
        difference.is_finite().then_some(Amount(difference))
    }

    /// JSON number text for this amount, or `None` for NaN and infinities.
    ///
    /// Shortest round-trip digits in plain notation for `1e-6 <= |x| < 1e21`,
    /// exponent notation otherwise, with an explicit `+` on positive
    /// exponents and no zero padding (`1e+21`, `1e-7`).
    pub fn to_json_number(self) -> Option<String> {
        if !self.0.is_finite() {
            return None;
        }
        let abs = self.0.abs();
        if abs != 0.0 && !(1e-6..1e21).contains(&abs) {
            let text = format!("{:e}", self.0);
            return Some(match text.split_once('e') {
                Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                    format!("{}e+{}", mantissa, exponent)
                }
                _ => text,
            });
        }
        Some(format!("{}", self.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_json_number() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.to_json_number().ok_or_else(|| {
            <S::Error as ser::Error>::custom(format!("amount {} is not a finite number", self.0))
        })?;
        RawValue::from_string(text)
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(de::Error::custom(format!("amount {} is not a finite number", value)));
        }
        Ok(Amount(value))
    }
}

/// Hex-encoded SHA-256 transaction identifier.
pub type TxId = String;

/// Sentinel placed in both the signature and public key of genesis transactions.
pub const GENESIS_SENTINEL: &[u8] = b"genesis";

/// Identifies one output of one transaction; the UTXO set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl OutputRef {
    pub fn new(tx_id: impl Into<TxId>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// An intent to spend the output at `(tx_id, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl InputRef {
    pub fn new(tx_id: impl Into<TxId>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }

    /// The UTXO set key this input consumes.
    pub fn output_ref(&self) -> OutputRef {
        OutputRef::new(self.tx_id.clone(), self.index)
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// A payable value locked to an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub amount: Amount,
}

impl Output {
    pub fn new(address: impl Into<String>, amount: Amount) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// A signed value transfer. Immutable once signed by the external signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub inputs: Vec<InputRef>,
    pub outputs: Vec<Output>,
    #[serde(default, with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(default, rename = "pubkey", with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Transaction {
    /// Builds an unsigned transaction with its id already derived from the
    /// canonical encoding of `(inputs, outputs)`.
    pub fn new(
        inputs: Vec<InputRef>,
        outputs: Vec<Output>,
        timestamp: i64,
    ) -> Result<Self, ChainError> {
        let id = codec::transaction_id(&inputs, &outputs)?;
        Ok(Transaction {
            id,
            inputs,
            outputs,
            signature: Vec::new(),
            public_key: Vec::new(),
            timestamp,
        })
    }

    /// Zero-input transaction that creates `amount` for `address` from nothing.
    pub fn genesis(
        address: impl Into<String>,
        amount: Amount,
        timestamp: i64,
    ) -> Result<Self, ChainError> {
        let mut tx = Self::new(Vec::new(), vec![Output::new(address, amount)], timestamp)?;
        tx.sign(GENESIS_SENTINEL.to_vec(), GENESIS_SENTINEL.to_vec());
        Ok(tx)
    }

    pub fn is_genesis(&self) -> bool {
        self.inputs.is_empty()
            && self.signature == GENESIS_SENTINEL
            && self.public_key == GENESIS_SENTINEL
    }

    /// The exact bytes the signature must cover.
    pub fn signable_message(&self) -> Result<Vec<u8>, ChainError> {
        codec::encode(&self.inputs, &self.outputs)
    }

    /// Attaches a signature produced by the external signer.
    pub fn sign(&mut self, signature: Vec<u8>, public_key: Vec<u8>) {
        self.signature = signature;
        self.public_key = public_key;
    }

    /// Sum of output amounts, failing on overflow.
    pub fn output_sum(&self) -> Result<Amount, ChainError> {
        self.outputs.iter().try_fold(Amount::ZERO, |acc, out| {
            acc.checked_add(out.amount)
                .ok_or_else(|| ChainError::Ledger("output sum overflows".to_string()))
        })
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}
