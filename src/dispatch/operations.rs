//! The six account operations, each a declaration of the dispatch template.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::validate::{name_in_range, paging_in_range, Rejection};
use crate::dispatch::Operation;
use crate::rpc::messages::*;
use crate::rpc::{AccountClient, CallOptions, Status};

/// `{name, password}` body of login and create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamePasswordParams {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenameParams {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordParams {
    pub id: u32,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeleteParams {
    pub id: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub name: String,
    pub offset: i64,
    pub limit: i64,
}

pub struct Login;

impl Operation for Login {
    const NAME: &'static str = "login";
    const METHOD: &'static str = "Login";
    type Params = NamePasswordParams;
    type Request = LoginRequest;
    type Response = LoginResponse;

    fn validate(params: &Self::Params) -> Result<(), Rejection> {
        if params.name.is_empty() || params.password.is_empty() {
            return Err(Rejection::InvalidParameters);
        }
        Ok(())
    }

    fn request(params: Self::Params) -> Self::Request {
        LoginRequest {
            name: params.name,
            password: params.password,
        }
    }

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>> {
        Box::pin(client.login(request, opts))
    }

    fn respond(response: Self::Response) -> serde_json::Result<Option<Value>> {
        Ok(Some(json!({ "token": response.token })))
    }
}

pub struct CreateAccount;

impl Operation for CreateAccount {
    const NAME: &'static str = "create";
    const METHOD: &'static str = "CreateAccount";
    type Params = NamePasswordParams;
    type Request = CreateAccountRequest;
    type Response = Empty;

    fn validate(params: &Self::Params) -> Result<(), Rejection> {
        if !name_in_range(&params.name) || params.password.is_empty() {
            return Err(Rejection::InvalidAccountOrPassword);
        }
        Ok(())
    }

    fn request(params: Self::Params) -> Self::Request {
        CreateAccountRequest {
            name: params.name,
            password: params.password,
        }
    }

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>> {
        Box::pin(client.create_account(request, opts))
    }

    fn respond(_: Self::Response) -> serde_json::Result<Option<Value>> {
        Ok(None)
    }
}

pub struct RenameAccount;

impl Operation for RenameAccount {
    const NAME: &'static str = "rename";
    const METHOD: &'static str = "UpdateAccountName";
    type Params = RenameParams;
    type Request = UpdateAccountNameRequest;
    type Response = Empty;

    fn validate(params: &Self::Params) -> Result<(), Rejection> {
        if params.id == 0 {
            return Err(Rejection::AccountNotFound);
        }
        if !name_in_range(&params.name) {
            return Err(Rejection::NameLength);
        }
        Ok(())
    }

    fn request(params: Self::Params) -> Self::Request {
        UpdateAccountNameRequest {
            id: params.id,
            name: params.name,
        }
    }

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>> {
        Box::pin(client.update_account_name(request, opts))
    }

    fn respond(_: Self::Response) -> serde_json::Result<Option<Value>> {
        Ok(None)
    }
}

pub struct ChangePassword;

impl Operation for ChangePassword {
    const NAME: &'static str = "change_password";
    const METHOD: &'static str = "UpdateAccountPassword";
    type Params = ChangePasswordParams;
    type Request = UpdateAccountPasswordRequest;
    type Response = Empty;

    fn validate(params: &Self::Params) -> Result<(), Rejection> {
        if params.id == 0 {
            return Err(Rejection::AccountNotFound);
        }
        if params.password.is_empty() {
            return Err(Rejection::PasswordRequired);
        }
        Ok(())
    }

    fn request(params: Self::Params) -> Self::Request {
        UpdateAccountPasswordRequest {
            id: params.id,
            password: params.password,
        }
    }

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>> {
        Box::pin(client.update_account_password(request, opts))
    }

    fn respond(_: Self::Response) -> serde_json::Result<Option<Value>> {
        Ok(None)
    }
}

pub struct DeleteAccount;

impl Operation for DeleteAccount {
    const NAME: &'static str = "delete";
    const METHOD: &'static str = "DeleteAccount";
    type Params = DeleteParams;
    type Request = DeleteAccountRequest;
    type Response = Empty;

    fn validate(params: &Self::Params) -> Result<(), Rejection> {
        if params.id == 0 {
            return Err(Rejection::AccountNotFound);
        }
        Ok(())
    }

    fn request(params: Self::Params) -> Self::Request {
        DeleteAccountRequest { id: params.id }
    }

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>> {
        Box::pin(client.delete_account(request, opts))
    }

    fn respond(_: Self::Response) -> serde_json::Result<Option<Value>> {
        Ok(None)
    }
}

pub struct ListAccounts;

impl Operation for ListAccounts {
    const NAME: &'static str = "list";
    const METHOD: &'static str = "AccountList";
    type Params = ListParams;
    type Request = AccountListRequest;
    type Response = AccountListResponse;

    fn validate(params: &Self::Params) -> Result<(), Rejection> {
        if !paging_in_range(params.offset, params.limit) {
            return Err(Rejection::InvalidPaging);
        }
        Ok(())
    }

    fn request(params: Self::Params) -> Self::Request {
        // Both fit in u32 once validated.
        AccountListRequest {
            name: params.name,
            offset: params.offset as u32,
            limit: params.limit as u32,
        }
    }

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>> {
        Box::pin(client.account_list(request, opts))
    }

    fn respond(response: Self::Response) -> serde_json::Result<Option<Value>> {
        serde_json::to_value(response).map(Some)
    }
}
