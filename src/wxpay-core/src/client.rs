//! Top-level API client.
//!
//! Owns the merchant credential, the platform certificate store and the
//! signed transport, and exposes the endpoint calls on top of them.

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::bill::{self, DEFAULT_BILL_TYPE, TAR_TYPE_GZIP};
use crate::certificates::{CertificateList, CertificateStore, PlatformCertificate, RefreshReport};
use crate::config::{ApiV3Key, ClientConfig};
use wxpay_crypto::RsaPrivateKey;

use crate::credential::Credential;
use crate::error::PayError;
use crate::https::HttpsClient;
use crate::notify::{parse_complaint_notify, ComplaintEvent};
use crate::types::{
    Bill, Complaint, ComplaintNotification, NegotiationHistory, Page, RefundsOrder, RefundsReq,
    TradeQuery,
};
use crate::validation::WechatPayValidator;
use crate::verifier::{CertificateVerifier, NullVerifier};

/// Platform certificate list.
pub const CERTIFICATES_PATH: &str = "/v3/certificates";
/// Order query by provider transaction id.
pub const TRANSACTIONS_BY_ID_PATH: &str = "/v3/pay/transactions/id";
/// Order query by merchant trade number.
pub const TRANSACTIONS_BY_OUT_TRADE_NO_PATH: &str = "/v3/pay/transactions/out-trade-no";
/// Domestic refund submission.
pub const REFUNDS_PATH: &str = "/v3/refund/domestic/refunds";
/// Trade bill application.
pub const TRADE_BILL_PATH: &str = "/v3/bill/tradebill";
/// Fund-flow bill application.
pub const FUNDFLOW_BILL_PATH: &str = "/v3/bill/fundflowbill";
/// Complaint list and details.
pub const COMPLAINTS_PATH: &str = "/v3/merchant-service/complaints-v2";
/// Complaint notification callback registration.
pub const COMPLAINT_NOTIFICATIONS_PATH: &str = "/v3/merchant-service/complaint-notifications";

/// Page size for paginated list endpoints.
pub const PAGE_LIMIT: u32 = 50;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// WeChat Pay API v3 client.
pub struct WechatPayClient {
    credentials: Arc<dyn Credential>,
    merchant_key: Option<RsaPrivateKey>,
    store: Arc<CertificateStore>,
    https: HttpsClient,
    bootstrap: WechatPayValidator<NullVerifier>,
    api_v3_key: ApiV3Key,
}

impl std::fmt::Debug for WechatPayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatPayClient")
            .field("mchid", &self.credentials.mchid())
            .field("certificates", &self.store.len())
            .field("https", &self.https)
            .finish_non_exhaustive()
    }
}

impl WechatPayClient {
    /// Create a client trusting the given bootstrap platform certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn new(
        config: &ClientConfig,
        credentials: impl Credential + 'static,
        api_v3_key: ApiV3Key,
        certificates: impl IntoIterator<Item = PlatformCertificate>,
    ) -> Result<Self, PayError> {
        let store = Arc::new(CertificateStore::with_certificates(certificates));
        Self::with_store(config, credentials, api_v3_key, store)
    }

    /// Create a client around an existing certificate store.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn with_store(
        config: &ClientConfig,
        credentials: impl Credential + 'static,
        api_v3_key: ApiV3Key,
        store: Arc<CertificateStore>,
    ) -> Result<Self, PayError> {
        let credentials: Arc<dyn Credential> = Arc::new(credentials);
        let validator = WechatPayValidator::new(CertificateVerifier::new(Arc::clone(&store)))
            .with_tolerance(config.tolerance);
        let https = HttpsClient::new(
            config,
            Arc::clone(&credentials),
            Arc::new(validator),
        )?;

        if !store.has_unexpired() {
            warn!("No unexpired platform certificate; responses will fail verification until refresh");
        }

        Ok(Self {
            credentials,
            merchant_key: None,
            store,
            https,
            bootstrap: WechatPayValidator::new(NullVerifier).with_tolerance(config.tolerance),
            api_v3_key,
        })
    }

    /// Merchant ID.
    #[must_use]
    pub fn mchid(&self) -> &str {
        self.credentials.mchid()
    }

    /// Attach the merchant private key used to decrypt RSA-OAEP protected
    /// response fields such as `payer_phone`.
    #[must_use]
    pub fn with_merchant_key(mut self, key: RsaPrivateKey) -> Self {
        self.merchant_key = Some(key);
        self
    }

    /// Merchant credential.
    #[must_use]
    pub fn credentials(&self) -> &dyn Credential {
        self.credentials.as_ref()
    }

    /// Shared platform certificate store.
    #[must_use]
    pub fn certificate_store(&self) -> &Arc<CertificateStore> {
        &self.store
    }

    /// Underlying signed transport.
    #[must_use]
    pub fn https(&self) -> &HttpsClient {
        &self.https
    }

    // =========================================================================
    // Certificates
    // =========================================================================

    /// Download the platform certificate list and add new certificates.
    ///
    /// The list response is checked for headers and freshness but its
    /// signature is not verified: it may be signed by a certificate that is
    /// only learned from this very response.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or decoding errors. Per-certificate
    /// failures are reported in the [`RefreshReport`] instead.
    #[instrument(skip(self))]
    pub async fn refresh_certificates(&self) -> Result<RefreshReport, PayError> {
        let response = self.https.get_with(CERTIFICATES_PATH, &self.bootstrap).await?;
        let list: CertificateList = response.json()?;
        let report = self.store.apply(&list, self.api_v3_key.as_bytes());
        info!(
            listed = list.data.len(),
            inserted = report.inserted.len(),
            failed = report.failed.len(),
            total = self.store.len(),
            "Platform certificates refreshed"
        );
        Ok(report)
    }

    // =========================================================================
    // Orders and refunds
    // =========================================================================

    /// Query an order by provider transaction id.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn query_order_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<TradeQuery, PayError> {
        let id = required("transaction_id", transaction_id)?;
        let url = self.endpoint(TRANSACTIONS_BY_ID_PATH, &[id], &[("mchid", self.mchid())])?;
        self.https.get(url.as_str()).await?.json()
    }

    /// Query an order by merchant trade number.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn query_order_by_out_trade_no(
        &self,
        out_trade_no: &str,
    ) -> Result<TradeQuery, PayError> {
        let no = required("out_trade_no", out_trade_no)?;
        let url = self.endpoint(
            TRANSACTIONS_BY_OUT_TRADE_NO_PATH,
            &[no],
            &[("mchid", self.mchid())],
        )?;
        self.https.get(url.as_str()).await?.json()
    }

    /// Submit a refund.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self, request), fields(out_refund_no = %request.out_refund_no))]
    pub async fn refund(&self, request: &RefundsReq) -> Result<RefundsOrder, PayError> {
        required("out_refund_no", &request.out_refund_no)?;
        if request.transaction_id.trim().is_empty() && request.out_trade_no.trim().is_empty() {
            return Err(PayError::malformed(
                "refund needs a transaction_id or an out_trade_no",
            ));
        }
        let order: RefundsOrder = self.https.post(REFUNDS_PATH, request).await?.json()?;
        info!(refund_id = %order.refund_id, status = %order.status, "Refund submitted");
        Ok(order)
    }

    // =========================================================================
    // Bills
    // =========================================================================

    /// Apply for and download a gzip-compressed trade bill.
    ///
    /// `bill_type` defaults to `ALL`.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or integrity errors.
    #[instrument(skip(self))]
    pub async fn trade_bill(
        &self,
        bill_date: NaiveDate,
        bill_type: Option<&str>,
    ) -> Result<Vec<u8>, PayError> {
        let date = bill_date.format(DATE_FORMAT).to_string();
        let bill_type = bill_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_BILL_TYPE);
        let url = self.endpoint(
            TRADE_BILL_PATH,
            &[],
            &[
                ("bill_date", date.as_str()),
                ("bill_type", bill_type),
                ("tar_type", TAR_TYPE_GZIP),
            ],
        )?;
        self.apply_and_download(url).await
    }

    /// Apply for and download a gzip-compressed fund-flow bill.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or integrity errors.
    #[instrument(skip(self))]
    pub async fn fundflow_bill(
        &self,
        bill_date: NaiveDate,
        account_type: Option<&str>,
    ) -> Result<Vec<u8>, PayError> {
        let date = bill_date.format(DATE_FORMAT).to_string();
        let mut query = vec![("bill_date", date.as_str())];
        if let Some(account_type) = account_type.map(str::trim).filter(|t| !t.is_empty()) {
            query.push(("account_type", account_type));
        }
        query.push(("tar_type", TAR_TYPE_GZIP));
        let url = self.endpoint(FUNDFLOW_BILL_PATH, &[], &query)?;
        self.apply_and_download(url).await
    }

    /// Download a bill file and check its digest.
    ///
    /// The download is signed but its response is not validated.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or integrity errors.
    #[instrument(skip(self, bill))]
    pub async fn download_bill(&self, bill: &Bill) -> Result<Vec<u8>, PayError> {
        required("download_url", &bill.download_url)?;
        let body = self.https.download(&bill.download_url).await?.into_body();
        debug!(len = body.len(), tar_type = %bill.tar_type, "Bill downloaded");
        bill::unpack(bill, body)
    }

    async fn apply_and_download(&self, url: Url) -> Result<Vec<u8>, PayError> {
        let mut bill: Bill = self.https.get(url.as_str()).await?.json()?;
        if bill.tar_type.is_empty() {
            bill.tar_type = TAR_TYPE_GZIP.to_string();
        }
        self.download_bill(&bill).await
    }

    // =========================================================================
    // Complaints
    // =========================================================================

    /// List all complaints between two dates, following pagination.
    ///
    /// Payer contact numbers are decrypted when the merchant key allows it.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn list_complaints(
        &self,
        begin_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Complaint>, PayError> {
        let begin = begin_date.format(DATE_FORMAT).to_string();
        let end = end_date.format(DATE_FORMAT).to_string();
        let mut complaints: Vec<Complaint> = self
            .paginate(
                COMPLAINTS_PATH,
                &[],
                &[("begin_date", begin.as_str()), ("end_date", end.as_str())],
            )
            .await?;
        for complaint in &mut complaints {
            self.reveal_payer_phone(complaint);
        }
        Ok(complaints)
    }

    /// Complaint details.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn get_complaint(&self, complaint_id: &str) -> Result<Complaint, PayError> {
        let id = required("complaint_id", complaint_id)?;
        let url = self.endpoint(COMPLAINTS_PATH, &[id], &[])?;
        let mut complaint: Complaint = self.https.get(url.as_str()).await?.json()?;
        self.reveal_payer_phone(&mut complaint);
        Ok(complaint)
    }

    /// Full negotiation history of a complaint, following pagination.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn negotiation_histories(
        &self,
        complaint_id: &str,
    ) -> Result<Vec<NegotiationHistory>, PayError> {
        let id = required("complaint_id", complaint_id)?;
        self.paginate(COMPLAINTS_PATH, &[id, "negotiation-historys"], &[])
            .await
    }

    /// Mark a complaint as handled.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or validation errors.
    #[instrument(skip(self))]
    pub async fn complete_complaint(&self, complaint_id: &str) -> Result<(), PayError> {
        let id = required("complaint_id", complaint_id)?;
        let url = self.endpoint(COMPLAINTS_PATH, &[id, "complete"], &[])?;
        let body = serde_json::json!({ "complainted_mchid": self.mchid() });
        self.https.post(url.as_str(), &body).await?;
        info!(complaint_id = %id, "Complaint completed");
        Ok(())
    }

    /// Register the complaint notification callback URL.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn create_complaint_notification(
        &self,
        url: &str,
    ) -> Result<ComplaintNotification, PayError> {
        let request = notification_request(url)?;
        self.https
            .post(COMPLAINT_NOTIFICATIONS_PATH, &request)
            .await?
            .json()
    }

    /// Current complaint notification callback.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors.
    #[instrument(skip(self))]
    pub async fn get_complaint_notification(&self) -> Result<ComplaintNotification, PayError> {
        self.https.get(COMPLAINT_NOTIFICATIONS_PATH).await?.json()
    }

    /// Replace the complaint notification callback URL.
    ///
    /// # Errors
    ///
    /// Returns transport, provider, validation or decoding errors, or
    /// [`PayError::MalformedInput`] if the provider echoes a different URL.
    #[instrument(skip(self))]
    pub async fn update_complaint_notification(
        &self,
        url: &str,
    ) -> Result<ComplaintNotification, PayError> {
        let request = notification_request(url)?;
        let reply: ComplaintNotification = self
            .https
            .put(COMPLAINT_NOTIFICATIONS_PATH, &request)
            .await?
            .json()?;
        if reply.url != request.url {
            warn!(requested = %request.url, returned = %reply.url, "Notification URL not updated");
            return Err(PayError::malformed(format!(
                "complaint notification url not updated: requested [{}], provider returned [{}]",
                request.url, reply.url
            )));
        }
        Ok(reply)
    }

    /// Remove the complaint notification callback.
    ///
    /// # Errors
    ///
    /// Returns transport, provider or validation errors.
    #[instrument(skip(self))]
    pub async fn delete_complaint_notification(&self) -> Result<(), PayError> {
        self.https.delete(COMPLAINT_NOTIFICATIONS_PATH).await?;
        Ok(())
    }

    /// Parse a complaint notification callback body with this client's API v3 key.
    ///
    /// # Errors
    ///
    /// Fails if the body is not a notification or its resource does not decrypt.
    pub fn parse_complaint_notify(&self, body: &[u8]) -> Result<ComplaintEvent, PayError> {
        parse_complaint_notify(body, &self.api_v3_key)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Fetch every page of a list endpoint.
    ///
    /// Stops on an empty page or once the offset reaches the reported total.
    async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, PayError> {
        let limit = PAGE_LIMIT.to_string();
        let mut items = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let offset_param = offset.to_string();
            let mut params = query.to_vec();
            params.push(("limit", limit.as_str()));
            params.push(("offset", offset_param.as_str()));

            let url = self.endpoint(path, segments, &params)?;
            let page: Page<T> = self.https.get(url.as_str()).await?.json()?;
            let fetched = page.data.len();
            items.extend(page.data);
            debug!(path = %path, offset, fetched, total = page.total_count, "Fetched page");

            offset = offset.saturating_add(PAGE_LIMIT);
            if fetched == 0 || offset >= page.total_count {
                break;
            }
        }

        Ok(items)
    }

    /// Build a request URL. `segments` are appended percent-encoded, so a
    /// caller-supplied id always stays a single path segment.
    fn endpoint(
        &self,
        path: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, PayError> {
        let raw = format!("{}{}", self.https.base_url(), path);
        let mut url =
            Url::parse(&raw).map_err(|e| PayError::malformed(format!("Invalid URL {raw}: {e}")))?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|()| PayError::malformed(format!("Invalid URL {raw}: not a path URL")))?
                .extend(segments.iter().copied());
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn reveal_payer_phone(&self, complaint: &mut Complaint) {
        let Some(key) = self.merchant_key.as_ref() else {
            return;
        };
        if complaint.payer_phone.is_empty() {
            return;
        }
        match wxpay_crypto::decrypt_oaep(key, &complaint.payer_phone) {
            Ok(phone) => complaint.payer_phone = phone,
            Err(e) => {
                debug!(complaint_id = %complaint.complaint_id, error = %e, "payer_phone left encrypted");
            }
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, PayError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PayError::malformed(format!("{field} must not be empty")));
    }
    Ok(value)
}

fn notification_request(url: &str) -> Result<ComplaintNotification, PayError> {
    let url = required("url", url)?;
    Url::parse(url).map_err(|e| PayError::malformed(format!("Invalid notification URL {url}: {e}")))?;
    Ok(ComplaintNotification {
        mchid: String::new(),
        url: url.to_string(),
    })
}
