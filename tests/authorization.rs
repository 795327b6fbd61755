use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn review_ownership_is_enforced() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (alice, _) = app.register("alice@example.com").await?;
    let (bob, _) = app.register("bob@example.com").await?;

    let product_id = app.create_product(&admin, "Kettle", 29.5).await?;
    let review_id = app.create_review(&alice, product_id, 4).await?;

    // another customer passes the route policy but not the ownership check
    let uri = format!("/reviews/{}", review_id);
    let (status, body) = app.request("DELETE", &uri, Some(&bob), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(body["message"], "cannot delete this review");

    let (status, _) = app
        .request("PATCH", &uri, Some(&bob), Some(json!({ "rating": 1 })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // existence is checked before ownership
    let (status, _) = app.request("DELETE", "/reviews/9999", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the author may edit and delete
    let (status, body) = app
        .request("PATCH", &uri, Some(&alice), Some(json!({ "rating": 5 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 5);

    let (status, _) = app.request("DELETE", &uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.request("GET", &uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn admin_manages_any_review() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (alice, _) = app.register("alice@example.com").await?;

    let product_id = app.create_product(&admin, "Teapot", 18.0).await?;
    let review_id = app.create_review(&alice, product_id, 2).await?;

    let (status, _) = app
        .request("DELETE", &format!("/reviews/{}", review_id), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn staff_cannot_delete_products() -> Result<()> {
    let app = common::spawn().await?;
    let (staff, _) = app.register_as("staff@example.com", "staff").await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;

    // staff passes the role guard for catalog edits
    let product_id = app.create_product(&staff, "Mug", 9.99).await?;
    let uri = format!("/products/{}", product_id);

    let (status, body) = app
        .request("PATCH", &uri, Some(&staff), Some(json!({ "price": 11.5 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 11.5);

    let (status, _) = app.request("DELETE", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the guard never reads the target, so a missing product is still 403
    let (status, _) = app.request("DELETE", "/products/9999", Some(&staff), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.request("DELETE", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn customers_cannot_edit_catalog() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (customer, _) = app.register("carol@example.com").await?;
    let product_id = app.create_product(&admin, "Spoon", 2.0).await?;

    let (status, _) = app
        .request("POST", "/products", Some(&customer), Some(json!({ "name": "Fork", "price": 2.0 })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/products/{}", product_id),
            Some(&customer),
            Some(json!({ "price": 0.5 })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // reading the catalog is allowed
    let (status, _) = app
        .request("GET", &format!("/products/{}", product_id), Some(&customer), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn missing_token_is_unauthorized() -> Result<()> {
    let app = common::spawn().await?;

    for (method, uri) in [
        ("GET", "/products"),
        ("POST", "/reviews"),
        ("GET", "/orders"),
        ("GET", "/orders/1"),
        ("DELETE", "/users/1"),
    ] {
        let (status, _) = app.request(method, uri, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }

    Ok(())
}

#[tokio::test]
async fn order_access_by_role() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (staff, _) = app.register_as("staff@example.com", "staff").await?;
    let (alice, _) = app.register("alice@example.com").await?;
    let (bob, _) = app.register("bob@example.com").await?;

    let product_id = app.create_product(&admin, "Lamp", 40.0).await?;
    let order = app.create_order(&alice, product_id, 1).await?;
    let uri = format!("/orders/{}", order["id"]);

    // owner reads, other customers do not
    let (status, _) = app.request("GET", &uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request("GET", &uri, Some(&bob), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("GET", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::OK);

    // listing is for admin and staff only
    let (status, _) = app.request("GET", "/orders", Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.request("GET", "/orders", Some(&staff), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    // customers cannot change status, staff can
    let (status, _) = app
        .request("PATCH", &uri, Some(&alice), Some(json!({ "status": "cancelled" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .request("PATCH", &uri, Some(&staff), Some(json!({ "status": "shipped" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");

    // only admins delete orders
    let (status, _) = app.request("DELETE", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("DELETE", &uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("DELETE", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.request("GET", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn user_profile_rules() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (staff, _) = app.register_as("staff@example.com", "staff").await?;
    let (alice, alice_id) = app.register("alice@example.com").await?;
    let (bob, bob_id) = app.register("bob@example.com").await?;
    let alice_uri = format!("/users/{}", alice_id);
    let bob_uri = format!("/users/{}", bob_id);

    // self read always, others need read access
    let (status, _) = app.request("GET", &alice_uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request("GET", &bob_uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("GET", &bob_uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::OK);

    // listing needs read access to users
    let (status, _) = app.request("GET", "/users", Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.request("GET", "/users?role=customer", Some(&staff), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    // customers update only themselves
    let (status, _) = app
        .request("PATCH", &bob_uri, Some(&alice), Some(json!({ "first_name": "Mallory" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .request("PATCH", &alice_uri, Some(&alice), Some(json!({ "first_name": "Alicia" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Alicia");

    // no self-promotion
    let (status, _) = app
        .request("PATCH", &alice_uri, Some(&alice), Some(json!({ "role": "admin" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = app.request("GET", &alice_uri, Some(&alice), None).await?;
    assert_eq!(body["role"], "customer");

    // staff cannot update users at all
    let (status, _) = app
        .request("PATCH", &bob_uri, Some(&staff), Some(json!({ "first_name": "Robert" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // admins change roles and delete users
    let (status, body) = app
        .request("PATCH", &bob_uri, Some(&admin), Some(json!({ "role": "staff" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "staff");

    // bob's existing token now carries staff rights
    let (status, _) = app.request("GET", "/orders", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.request("DELETE", &bob_uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("DELETE", &bob_uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.request("DELETE", &bob_uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn categories_are_public_to_read_and_staff_managed() -> Result<()> {
    let app = common::spawn().await?;
    let (staff, _) = app.register_as("staff@example.com", "staff").await?;
    let (customer, _) = app.register("carol@example.com").await?;

    let (status, _) = app
        .request("POST", "/categories", Some(&customer), Some(json!({ "name": "Brewing" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request("POST", "/categories", None, Some(json!({ "name": "Brewing" })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let brewing = app.create_category(&staff, "Brewing").await?;
    app.create_category(&staff, "Accessories").await?;
    let uri = format!("/categories/{}", brewing);

    let (status, body) = app
        .request("POST", "/categories", Some(&staff), Some(json!({ "name": "Brewing" })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "category name already in use");

    // reading needs no token
    let (status, body) = app.request("GET", "/categories?search=brew", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let (_, body) = app
        .request("GET", "/categories?sort_by=name&sort_order=desc", None, None)
        .await?;
    assert_eq!(body["data"][0]["id"], brewing);
    let (status, _) = app.request("GET", &uri, None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request("GET", "/categories/9999", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request("PATCH", &uri, Some(&customer), Some(json!({ "name": "Tea" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .request("PATCH", &uri, Some(&staff), Some(json!({ "description": "Pour-over gear" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Pour-over gear");

    let (status, _) = app.request("DELETE", &uri, Some(&customer), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("DELETE", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.request("DELETE", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn cart_ownership_is_enforced() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (staff, _) = app.register_as("staff@example.com", "staff").await?;
    let (alice, alice_id) = app.register("alice@example.com").await?;
    let (bob, _) = app.register("bob@example.com").await?;

    let product_id = app.create_product(&admin, "Beans", 12.0).await?;
    let cart = app.create_cart(&alice, product_id, 1).await?;
    let uri = format!("/cart/{}", cart["id"]);
    let update = json!({ "items": [{ "product_id": product_id, "quantity": 4 }] });

    // the owner has full access
    let (status, _) = app.request("GET", &uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.request("PATCH", &uri, Some(&alice), Some(update.clone())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 48.0);

    // other customers are denied after the cart is found
    let (status, body) = app.request("GET", &uri, Some(&bob), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "cannot read this cart");
    let (status, _) = app.request("PATCH", &uri, Some(&bob), Some(update.clone())).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("DELETE", &uri, Some(&bob), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("GET", "/cart/9999", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // staff read any cart but cannot change it
    let (status, _) = app.request("GET", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request("DELETE", &uri, Some(&staff), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // listing is for admin and staff only
    let (status, _) = app.request("GET", "/cart", Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    app.create_cart(&bob, product_id, 1).await?;
    let (status, body) = app
        .request("GET", &format!("/cart?user_id={}", alice_id), Some(&staff), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let (_, body) = app
        .request("GET", "/cart?sort_by=updated_at&sort_order=desc", Some(&admin), None)
        .await?;
    assert_eq!(body["total"], 2);

    let (status, _) = app.request("DELETE", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.request("GET", &uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn password_changes_are_self_service() -> Result<()> {
    let app = common::spawn().await?;
    let (admin, _) = app.register_as("admin@example.com", "admin").await?;
    let (staff, staff_id) = app.register_as("staff@example.com", "staff").await?;
    let (alice, alice_id) = app.register("alice@example.com").await?;
    let (bob, bob_id) = app.register("bob@example.com").await?;
    let alice_uri = format!("/users/{}/password", alice_id);

    let (status, body) = app
        .request(
            "POST",
            &alice_uri,
            Some(&alice),
            Some(json!({ "current_password": "wrong-password", "new_password": "new-password-1" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "current password is incorrect");

    let (status, _) = app
        .request(
            "POST",
            &alice_uri,
            Some(&alice),
            Some(json!({ "current_password": "password123", "new_password": "short" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            "POST",
            &alice_uri,
            Some(&alice),
            Some(json!({ "current_password": "password123", "new_password": "new-password-1" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let login = |password: &str| json!({ "email": "alice@example.com", "password": password });
    let (status, _) = app.request("POST", "/auth/login", None, Some(login("password123"))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request("POST", "/auth/login", None, Some(login("new-password-1")))
        .await?;
    assert_eq!(status, StatusCode::OK);

    // staff may change their own password, not someone else's
    let (status, _) = app
        .request(
            "POST",
            &format!("/users/{}/password", staff_id),
            Some(&staff),
            Some(json!({ "current_password": "password123", "new_password": "staff-password" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let bob_uri = format!("/users/{}/password", bob_id);
    let reset = json!({ "new_password": "reset-password" });
    for token in [&alice, &staff] {
        let (status, _) = app.request("POST", &bob_uri, Some(token), Some(reset.clone())).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    let (status, _) = app.request("POST", "/users/9999/password", Some(&bob), Some(reset.clone())).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // admins reset without the old password
    let (status, _) = app.request("POST", &bob_uri, Some(&admin), Some(reset)).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "bob@example.com", "password": "reset-password" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
