use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attestation evidence produced by the enclave, forwarded opaquely to
/// guardians.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationBundle {
    /// Raw attestation document bytes.
    pub attestation_doc: Vec<u8>,
    /// Certificate chain, leaf first, as the enclave produced it.
    pub certificate_chain: Vec<Vec<u8>>,
    pub enclave_public_key: String,
    /// Identity of the caller the attestation is bound to.
    pub caller_id: String,
}

/// Attestation as returned in the `data` of an enclave response.
#[derive(Debug, Deserialize)]
struct EnclaveAttestation {
    attestation_doc: String,
    #[serde(default)]
    certificate_chain: Vec<String>,
    public_key: String,
}

impl AttestationBundle {
    /// Build a bundle from enclave response data shaped
    /// `{attestation_doc, certificate_chain, public_key}` with base64 binary
    /// fields.
    pub fn from_enclave_data(data: &Value, caller_id: impl Into<String>) -> Result<Self, String> {
        let raw = EnclaveAttestation::deserialize(data)
            .map_err(|e| format!("unexpected attestation shape: {e}"))?;
        let attestation_doc = STANDARD
            .decode(&raw.attestation_doc)
            .map_err(|e| format!("attestation_doc is not base64: {e}"))?;
        let certificate_chain = raw
            .certificate_chain
            .iter()
            .enumerate()
            .map(|(i, cert)| {
                STANDARD
                    .decode(cert)
                    .map_err(|e| format!("certificate_chain[{i}] is not base64: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            attestation_doc,
            certificate_chain,
            enclave_public_key: raw.public_key,
            caller_id: caller_id.into(),
        })
    }
}

/// Body of `POST /attestation/submit`.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    attestation_doc: String,
    certificate_chain: Vec<String>,
    enclave_public_key: &'a str,
    tapp_id: &'a str,
}

impl<'a> From<&'a AttestationBundle> for SubmitRequest<'a> {
    fn from(bundle: &'a AttestationBundle) -> Self {
        Self {
            attestation_doc: STANDARD.encode(&bundle.attestation_doc),
            certificate_chain: bundle
                .certificate_chain
                .iter()
                .map(|cert| STANDARD.encode(cert))
                .collect(),
            enclave_public_key: &bundle.enclave_public_key,
            tapp_id: &bundle.caller_id,
        }
    }
}

/// Submission state reported by a guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitted,
    Pending,
    Verified,
    Failed,
}

/// Body of a successful `POST /attestation/submit`.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    pub attestation_id: String,
    pub submission_time: String,
    pub status: SubmissionStatus,
}

/// Result of a successful submission to one guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttestationSubmission {
    pub attestation_id: String,
    pub submission_time: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl TryFrom<SubmitResponse> for AttestationSubmission {
    type Error = String;

    fn try_from(resp: SubmitResponse) -> Result<Self, Self::Error> {
        let submission_time = parse_timestamp(&resp.submission_time)
            .ok_or_else(|| format!("submission_time {:?} is not ISO 8601", resp.submission_time))?;
        Ok(Self {
            attestation_id: resp.attestation_id,
            submission_time,
            status: resp.status,
        })
    }
}

/// Parse an ISO 8601 date-time. RFC 3339 first, then an explicit basic-format
/// offset, then a local date-time with no offset, which is read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Consensus state across guardians for one attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusState {
    Pending,
    Achieved,
    Failed,
    Disputed,
}

/// Body of a successful `GET /attestation/status/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub attestation_id: String,
    pub status: ConsensusState,
    pub guardians_verified: u32,
    pub total_guardians: u32,
}

/// Verification progress for one attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusStatus {
    pub attestation_id: String,
    pub status: ConsensusState,
    pub verified_count: u32,
    pub total_count: u32,
}

impl From<StatusResponse> for ConsensusStatus {
    fn from(resp: StatusResponse) -> Self {
        Self {
            attestation_id: resp.attestation_id,
            status: resp.status,
            verified_count: resp.guardians_verified,
            total_count: resp.total_guardians,
        }
    }
}

/// Outcome of a parallel health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub reachable: usize,
    pub total: usize,
}

impl HealthReport {
    pub fn all_reachable(&self) -> bool {
        self.reachable == self.total
    }
}
