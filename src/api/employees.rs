//! Employee endpoints. Paths are centralized here; the backend enforces
//! authorization for every call.

use super::{
    send_empty, send_json, with_bearer, ApiClient, ApiError, Employee, EmployeeInput,
    EmployeePatch,
};
use secrecy::SecretString;
use tracing::instrument;

impl ApiClient {
    /// Lists employees, optionally filtered by name.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    #[instrument(skip(self, token))]
    pub async fn list_employees(
        &self,
        token: &SecretString,
        name: Option<&str>,
    ) -> Result<Vec<Employee>, ApiError> {
        let mut request = with_bearer(self.get("/api/v1/employees"), token);

        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            request = request.query(&[("name", name)]);
        }

        send_json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the employee does not exist.
    #[instrument(skip(self, token))]
    pub async fn get_employee(&self, token: &SecretString, id: i64) -> Result<Employee, ApiError> {
        send_json(with_bearer(self.get(&format!("/api/v1/employee/{id}")), token)).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects the employee.
    #[instrument(skip(self, token, employee), fields(name = %employee.name))]
    pub async fn create_employee(
        &self,
        token: &SecretString,
        employee: &EmployeeInput,
    ) -> Result<Employee, ApiError> {
        send_json(with_bearer(self.post("/api/v1/employee"), token).json(employee)).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects the update.
    #[instrument(skip(self, token, patch))]
    pub async fn update_employee(
        &self,
        token: &SecretString,
        id: i64,
        patch: &EmployeePatch,
    ) -> Result<Employee, ApiError> {
        send_json(with_bearer(self.put(&format!("/api/v1/employee/{id}")), token).json(patch)).await
    }

    /// # Errors
    /// Returns an error if the request fails or the employee cannot be deleted.
    #[instrument(skip(self, token))]
    pub async fn delete_employee(&self, token: &SecretString, id: i64) -> Result<(), ApiError> {
        send_empty(with_bearer(self.delete(&format!("/api/v1/employee/{id}")), token)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::DEFAULT_TIMEOUT;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> SecretString {
        SecretString::from("access-1".to_string())
    }

    fn employee_json(id: i64, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "ssn": "123-45-6789",
            "address1": "1 Main St",
            "address2": "",
            "city": "Springfield",
            "state": "Illinois",
            "zip": "62701",
            "country": "USA"
        })
    }

    #[tokio::test]
    async fn list_sends_bearer_and_name_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/employees"))
            .and(header("Authorization", "Bearer access-1"))
            .and(query_param("name", "ann"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([employee_json(1, "Ann")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let employees = client.list_employees(&token(), Some(" ann ")).await.unwrap();

        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].name, "Ann");
    }

    #[tokio::test]
    async fn list_omits_blank_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/employees"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let employees = client.list_employees(&token(), Some("   ")).await.unwrap();
        assert!(employees.is_empty());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query().is_none());
    }

    #[tokio::test]
    async fn get_employee_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/employee/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(employee_json(7, "Bo")))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let employee = client.get_employee(&token(), 7).await.unwrap();
        assert_eq!(employee.id, 7);
        assert_eq!(employee.city, "Springfield");
    }

    #[tokio::test]
    async fn create_posts_input() {
        let server = MockServer::start().await;

        let input = EmployeeInput {
            name: "Cy".to_string(),
            ssn: "123-45-6789".to_string(),
            address1: "1 Main St".to_string(),
            address2: String::new(),
            city: "Springfield".to_string(),
            state: "Illinois".to_string(),
            zip: "62701".to_string(),
            country: "USA".to_string(),
        };

        Mock::given(method("POST"))
            .and(path("/api/v1/employee"))
            .and(body_json(serde_json::to_value(&input).unwrap()))
            .respond_with(ResponseTemplate::new(201).set_body_json(employee_json(9, "Cy")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let created = client.create_employee(&token(), &input).await.unwrap();
        assert_eq!(created.id, 9);
    }

    #[tokio::test]
    async fn update_sends_only_present_fields() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/api/v1/employee/9"))
            .and(body_json(json!({ "city": "Chicago" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(employee_json(9, "Cy")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let patch = EmployeePatch {
            city: Some("Chicago".to_string()),
            ..EmployeePatch::default()
        };
        client.update_employee(&token(), 9, &patch).await.unwrap();
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/employee/9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        client.delete_employee(&token(), 9).await.unwrap();
    }

    #[tokio::test]
    async fn missing_employee_is_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/employee/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let err = client.get_employee(&token(), 404).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 404,
                message: "not found".to_string()
            }
        );
    }
}
